//! Portable release archive (Windows)
//!
//! VapourSynth publishes a self-contained portable zip for Windows. It is
//! downloaded, unpacked into the work directory and its bundled wheel
//! installed; the unpacked directory goes on PATH.

use super::Provisioner;
use crate::catalog::VersionDescriptor;
use crate::config::schema::{ArchiveConfig, BuildConfig};
use crate::env::{EnvironmentOverlay, PATH};
use crate::error::{ProvisionError, ProvisionResult};
use crate::process::{CommandSpec, ProcessRunner};
use async_trait::async_trait;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Top-level directory inside the portable zip
pub(crate) const PORTABLE_DIR: &str = "VapourSynth64-Portable";

/// Downloads and unpacks archives
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    /// Download `url` to `dest`
    async fn fetch(&self, url: &str, dest: &Path) -> ProvisionResult<()>;

    /// Unpack the zip at `archive` into `dest`
    async fn extract(&self, archive: &Path, dest: &Path) -> ProvisionResult<()>;
}

/// Fetches over HTTPS with `ureq`, extracts with `zip`
pub struct HttpArchiveFetcher;

#[async_trait]
impl ArchiveFetcher for HttpArchiveFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> ProvisionResult<()> {
        let url = url.to_string();
        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || download(&url, &dest))
            .await
            .map_err(|e| ProvisionError::Internal(format!("download task failed: {}", e)))?
    }

    async fn extract(&self, archive: &Path, dest: &Path) -> ProvisionResult<()> {
        let archive = archive.to_path_buf();
        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || unpack_zip(&archive, &dest))
            .await
            .map_err(|e| ProvisionError::Internal(format!("extract task failed: {}", e)))?
    }
}

fn download(url: &str, dest: &Path) -> ProvisionResult<()> {
    info!("Downloading {}", url);
    let download_error = |reason: String| ProvisionError::Download {
        url: url.to_string(),
        reason,
    };

    let mut response = ureq::get(url)
        .call()
        .map_err(|e| download_error(e.to_string()))?;

    let mut file = File::create(dest)
        .map_err(|e| ProvisionError::io(format!("creating {}", dest.display()), e))?;
    let bytes = std::io::copy(&mut response.body_mut().as_reader(), &mut file)
        .map_err(|e| download_error(e.to_string()))?;

    debug!("Downloaded {} bytes to {}", bytes, dest.display());
    Ok(())
}

fn unpack_zip(archive_path: &Path, dest: &Path) -> ProvisionResult<()> {
    let archive_error = |reason: String| ProvisionError::Archive {
        path: archive_path.to_path_buf(),
        reason,
    };

    let file = File::open(archive_path)
        .map_err(|e| ProvisionError::io(format!("opening {}", archive_path.display()), e))?;
    let mut archive =
        zip::ZipArchive::new(BufReader::new(file)).map_err(|e| archive_error(e.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| archive_error(e.to_string()))?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(archive_error(format!("unsafe entry name {}", entry.name())));
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| ProvisionError::io(format!("creating {}", target.display()), e))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ProvisionError::io(format!("creating {}", parent.display()), e))?;
        }
        let mut out = File::create(&target)
            .map_err(|e| ProvisionError::io(format!("creating {}", target.display()), e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| archive_error(e.to_string()))?;
    }
    Ok(())
}

/// Installs the portable release instead of building
pub struct ArchiveProvisioner {
    archive: ArchiveConfig,
    build: BuildConfig,
    runner: Arc<dyn ProcessRunner>,
    fetcher: Arc<dyn ArchiveFetcher>,
}

impl ArchiveProvisioner {
    pub fn new(
        archive: ArchiveConfig,
        build: BuildConfig,
        runner: Arc<dyn ProcessRunner>,
        fetcher: Arc<dyn ArchiveFetcher>,
    ) -> Self {
        Self {
            archive,
            build,
            runner,
            fetcher,
        }
    }

    fn extract_dir(&self, version: &VersionDescriptor) -> PathBuf {
        self.build
            .work_dir
            .join(format!("vapoursynth-{}", version.vs_ref))
    }

    fn portable_dir(&self, version: &VersionDescriptor) -> PathBuf {
        self.extract_dir(version).join(PORTABLE_DIR)
    }

    /// pip-install the wheel bundled in the portable directory
    async fn install_wheel(&self, version: &VersionDescriptor) -> ProvisionResult<()> {
        let wheel_dir = self.portable_dir(version).join("wheel");
        let mut entries = tokio::fs::read_dir(&wheel_dir)
            .await
            .map_err(|e| ProvisionError::io(format!("reading {}", wheel_dir.display()), e))?;

        let mut wheel = None;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ProvisionError::io(format!("reading {}", wheel_dir.display()), e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("whl") {
                wheel = Some(path);
                break;
            }
        }

        let wheel = wheel.ok_or_else(|| ProvisionError::Archive {
            path: wheel_dir.clone(),
            reason: "no wheel in portable archive".to_string(),
        })?;

        info!("Installing {}", wheel.display());
        self.runner
            .run(
                &CommandSpec::new(&self.build.pip)
                    .arg("install")
                    .arg(wheel.display().to_string()),
            )
            .await
    }
}

#[async_trait]
impl Provisioner for ArchiveProvisioner {
    async fn provision(&self, version: &VersionDescriptor) -> ProvisionResult<EnvironmentOverlay> {
        let work_dir = &self.build.work_dir;
        tokio::fs::create_dir_all(work_dir)
            .await
            .map_err(|e| ProvisionError::io(format!("creating {}", work_dir.display()), e))?;

        let url = self.archive.url_for(&version.vs_ref);
        let zip_path = work_dir.join(format!("vapoursynth-{}.zip", version.vs_ref));
        self.fetcher.fetch(&url, &zip_path).await?;

        let extract_dir = self.extract_dir(version);
        if extract_dir.exists() {
            tokio::fs::remove_dir_all(&extract_dir).await.map_err(|e| {
                ProvisionError::io(format!("removing {}", extract_dir.display()), e)
            })?;
        }
        info!("Extracting VapourSynth to {}", extract_dir.display());
        self.fetcher.extract(&zip_path, &extract_dir).await?;

        self.install_wheel(version).await?;
        Ok(self.environment(version))
    }

    fn cached_dirs(&self, version: &VersionDescriptor) -> Vec<PathBuf> {
        vec![self.extract_dir(version)]
    }

    fn environment(&self, version: &VersionDescriptor) -> EnvironmentOverlay {
        let mut overlay = EnvironmentOverlay::new();
        overlay.push(PATH, self.portable_dir(version));
        overlay
    }

    async fn on_restored(&self, version: &VersionDescriptor) -> ProvisionResult<()> {
        self.install_wheel(version).await
    }

    fn provisioner_name(&self) -> &'static str {
        "portable archive"
    }
}
