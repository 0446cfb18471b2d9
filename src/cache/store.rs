//! Cache storage backends
//!
//! A `CacheStore` persists a set of directory trees under a key and
//! restores them given an ordered list of candidate keys.

use crate::cache::keys::{CacheKey, CacheKeySet};
use crate::error::{ProvisionError, ProvisionResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use tokio::fs;
use tracing::{debug, info, warn};

/// Key/value store over directory trees
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Restore `dirs` from the first key that matches, trying keys in order
    async fn restore(&self, dirs: &[PathBuf], keys: &CacheKeySet)
        -> ProvisionResult<Option<CacheKey>>;

    /// Persist `dirs` under `key`
    async fn save(&self, dirs: &[PathBuf], key: &CacheKey) -> ProvisionResult<()>;
}

/// Format bytes as human-readable size (e.g., "1.5 GB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Metadata stored next to each archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Key the entry was saved under
    pub key: String,
    /// Directories captured, in archive member order
    pub dirs: Vec<PathBuf>,
    /// When the entry was saved
    pub created_at: DateTime<Utc>,
    /// Compressed archive size
    pub size_bytes: u64,
}

/// Filesystem-backed cache: one `.tar.gz` plus a `.json` sidecar per key.
///
/// Lookup follows the CI cache convention. For each candidate key, an exact
/// match wins; otherwise the newest entry whose key starts with the
/// candidate matches. Entries only match when they captured the same
/// directory list. Entries are immutable once written.
pub struct LocalCacheStore {
    root: PathBuf,
}

impl LocalCacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File stem for a key: first 16 hex chars of its SHA256
    fn digest(key: &str) -> String {
        let hash = Sha256::digest(key.as_bytes());
        hex::encode(&hash[..8])
    }

    fn archive_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.tar.gz", Self::digest(key)))
    }

    fn metadata_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", Self::digest(key)))
    }

    /// All complete entries, newest first
    pub async fn list(&self) -> ProvisionResult<Vec<CacheEntry>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut dir = fs::read_dir(&self.root).await.map_err(|e| {
            ProvisionError::cache(format!("reading {}: {}", self.root.display(), e))
        })?;

        let mut entries = Vec::new();
        while let Some(item) = dir.next_entry().await.map_err(|e| {
            ProvisionError::cache(format!("reading {}: {}", self.root.display(), e))
        })? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let parsed = fs::read_to_string(&path)
                .await
                .map_err(|e| e.to_string())
                .and_then(|c| serde_json::from_str::<CacheEntry>(&c).map_err(|e| e.to_string()));
            match parsed {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("Ignoring unreadable cache entry {}: {}", path.display(), e),
            }
        }

        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    /// Remove the entry saved under `key`; returns whether one existed
    pub async fn remove(&self, key: &str) -> ProvisionResult<bool> {
        let metadata = self.metadata_path(key);
        if !metadata.exists() {
            return Ok(false);
        }

        // Metadata first: without it the archive is invisible to lookups.
        fs::remove_file(&metadata)
            .await
            .map_err(|e| ProvisionError::io(format!("removing {}", metadata.display()), e))?;

        let archive = self.archive_path(key);
        if archive.exists() {
            fs::remove_file(&archive)
                .await
                .map_err(|e| ProvisionError::io(format!("removing {}", archive.display()), e))?;
        }

        debug!("Removed cache entry {}", key);
        Ok(true)
    }

    /// Remove every entry; returns how many were removed
    pub async fn clear(&self) -> ProvisionResult<usize> {
        let mut removed = 0;
        for entry in self.list().await? {
            if self.remove(&entry.key).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Pick the entry to restore for `keys`
    fn select<'a>(
        entries: &'a [CacheEntry],
        keys: &CacheKeySet,
        dirs: &[PathBuf],
    ) -> Option<&'a CacheEntry> {
        let usable: Vec<&CacheEntry> = entries.iter().filter(|e| e.dirs == dirs).collect();

        for key in keys.iter() {
            if let Some(exact) = usable.iter().find(|e| e.key == key.as_str()) {
                return Some(exact);
            }
            if let Some(newest) = usable
                .iter()
                .filter(|e| e.key.starts_with(key.as_str()))
                .max_by_key(|e| e.created_at)
            {
                return Some(newest);
            }
        }

        None
    }
}

#[async_trait]
impl CacheStore for LocalCacheStore {
    async fn restore(
        &self,
        dirs: &[PathBuf],
        keys: &CacheKeySet,
    ) -> ProvisionResult<Option<CacheKey>> {
        let entries = self.list().await?;
        let Some(entry) = Self::select(&entries, keys, dirs) else {
            return Ok(None);
        };

        info!("Restoring {} from {}", entry.key, self.root.display());
        let archive = self.archive_path(&entry.key);
        let targets = dirs.to_vec();
        tokio::task::spawn_blocking(move || unpack(&archive, &targets))
            .await
            .map_err(|e| ProvisionError::cache(format!("restore task failed: {}", e)))?
            .map_err(|e| ProvisionError::cache(format!("unpacking {}: {}", entry.key, e)))?;

        Ok(Some(CacheKey::new(entry.key.clone())))
    }

    async fn save(&self, dirs: &[PathBuf], key: &CacheKey) -> ProvisionResult<()> {
        if !dirs.iter().any(|d| d.is_dir()) {
            return Err(ProvisionError::cache(
                "none of the cache paths exist, nothing to save",
            ));
        }

        let metadata_path = self.metadata_path(key.as_str());
        if metadata_path.exists() {
            info!("Cache entry {} already exists, not overwriting", key);
            return Ok(());
        }

        fs::create_dir_all(&self.root).await.map_err(|e| {
            ProvisionError::cache(format!("creating {}: {}", self.root.display(), e))
        })?;

        let archive = self.archive_path(key.as_str());
        let partial = archive.with_extension("partial");
        let sources = dirs.to_vec();
        let target = partial.clone();
        let size_bytes = tokio::task::spawn_blocking(move || pack(&sources, &target))
            .await
            .map_err(|e| ProvisionError::cache(format!("save task failed: {}", e)))?
            .map_err(|e| ProvisionError::cache(format!("packing {}: {}", key, e)))?;

        fs::rename(&partial, &archive)
            .await
            .map_err(|e| ProvisionError::cache(format!("finalizing {}: {}", key, e)))?;

        let entry = CacheEntry {
            key: key.to_string(),
            dirs: dirs.to_vec(),
            created_at: Utc::now(),
            size_bytes,
        };
        fs::write(&metadata_path, serde_json::to_string_pretty(&entry)?)
            .await
            .map_err(|e| ProvisionError::cache(format!("writing metadata for {}: {}", key, e)))?;

        info!("Saved cache entry {} ({})", key, format_bytes(size_bytes));
        Ok(())
    }
}

/// Write `dirs` into a gzipped tarball; member `N/...` holds `dirs[N]`
fn pack(dirs: &[PathBuf], dest: &Path) -> io::Result<u64> {
    let file = File::create(dest)?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    // Keep library symlinks (libzimg.so -> libzimg.so.2) as links
    builder.follow_symlinks(false);

    for (index, dir) in dirs.iter().enumerate() {
        if dir.is_dir() {
            builder.append_dir_all(index.to_string(), dir)?;
        } else {
            debug!("Cache path {} does not exist, skipping", dir.display());
        }
    }

    let mut writer = builder.into_inner()?.finish()?;
    writer.flush()?;
    drop(writer);

    Ok(std::fs::metadata(dest)?.len())
}

/// Extract an archive written by `pack` back into `dirs`
fn unpack(archive_path: &Path, dirs: &[PathBuf]) -> io::Result<()> {
    let file = File::open(archive_path)?;
    let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));
    archive.set_preserve_permissions(true);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        let mut components = path.components();

        let root = match components.next() {
            Some(Component::Normal(first)) => first
                .to_str()
                .and_then(|s| s.parse::<usize>().ok())
                .and_then(|index| dirs.get(index)),
            _ => None,
        }
        .ok_or_else(|| invalid_member(&path))?;

        let rest: PathBuf = components.collect();
        if rest
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(invalid_member(&path));
        }

        let dest = if rest.as_os_str().is_empty() {
            root.clone()
        } else {
            root.join(&rest)
        };
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        entry.unpack(&dest)?;
    }

    Ok(())
}

fn invalid_member(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("unexpected archive member {}", path.display()),
    )
}
