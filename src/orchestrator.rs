//! Install orchestration
//!
//! Resolve → restore from cache → (provision → save) → configure environment.
//! Cache failures never fail an install: a restore error counts as a miss
//! and a save error is only logged. A failed build stops everything, so
//! nothing is saved and the environment is left untouched.

use crate::cache::{CacheKey, CacheKeySet, CacheStore};
use crate::catalog::{VersionCatalog, VersionDescriptor};
use crate::env::{EnvironmentOverlay, EnvironmentSink};
use crate::error::ProvisionResult;
use crate::platform::PlatformFingerprint;
use crate::provision::Provisioner;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// What the caller asked for
#[derive(Debug, Clone)]
pub struct InstallRequest {
    /// Version name or alias
    pub token: String,
    /// Whether to consult and populate the cache
    pub cache_enabled: bool,
}

/// How the installation was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallPath {
    /// Restored from a cache entry
    Restored,
    /// Provisioned from scratch
    Built,
}

/// Result of a successful install
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub version: VersionDescriptor,
    pub path: InstallPath,
    /// Key of the entry that was restored, or the key saved under
    pub cache_key: Option<CacheKey>,
    pub overlay: EnvironmentOverlay,
}

pub struct InstallOrchestrator {
    catalog: VersionCatalog,
    provisioner: Box<dyn Provisioner>,
    cache: Arc<dyn CacheStore>,
    env_sink: Arc<dyn EnvironmentSink>,
    platform: PlatformFingerprint,
}

impl InstallOrchestrator {
    pub fn new(
        catalog: VersionCatalog,
        provisioner: Box<dyn Provisioner>,
        cache: Arc<dyn CacheStore>,
        env_sink: Arc<dyn EnvironmentSink>,
        platform: PlatformFingerprint,
    ) -> Self {
        Self {
            catalog,
            provisioner,
            cache,
            env_sink,
            platform,
        }
    }

    pub async fn run(&self, request: &InstallRequest) -> ProvisionResult<InstallOutcome> {
        let version = self.catalog.resolve(&request.token)?.clone();
        info!(
            "Resolved {} to VapourSynth {} with zimg {}",
            request.token, version.vs_ref, version.zimg_ref
        );

        let dirs = self.provisioner.cached_dirs(&version);
        let keys = CacheKeySet::derive(&version, &self.platform);

        let restored = if request.cache_enabled {
            self.try_restore(&dirs, &keys).await
        } else {
            info!("Cache disabled by user input");
            None
        };

        let (path, cache_key, overlay) = match restored {
            Some(key) => {
                self.provisioner.on_restored(&version).await?;
                (
                    InstallPath::Restored,
                    Some(key),
                    self.provisioner.environment(&version),
                )
            }
            None => {
                info!("Provisioning with {}", self.provisioner.provisioner_name());
                let overlay = self.provisioner.provision(&version).await?;
                let saved = if request.cache_enabled {
                    self.try_save(&dirs, keys.primary()).await
                } else {
                    None
                };
                (InstallPath::Built, saved, overlay)
            }
        };

        self.env_sink.apply(&overlay).await?;

        Ok(InstallOutcome {
            version,
            path,
            cache_key,
            overlay,
        })
    }

    async fn try_restore(&self, dirs: &[PathBuf], keys: &CacheKeySet) -> Option<CacheKey> {
        info!("Attempting to restore cache with keys: {}", keys);
        match self.cache.restore(dirs, keys).await {
            Ok(Some(key)) => {
                info!("Cache restored from key: {}", key);
                Some(key)
            }
            Ok(None) => {
                info!("No cache found, will build from source");
                None
            }
            Err(e) => {
                warn!("Cache restore failed, building from source: {}", e);
                None
            }
        }
    }

    async fn try_save(&self, dirs: &[PathBuf], key: &CacheKey) -> Option<CacheKey> {
        info!("Saving cache with key: {}", key);
        match self.cache.save(dirs, key).await {
            Ok(()) => Some(key.clone()),
            Err(e) => {
                warn!("Cache save failed: {}", e);
                None
            }
        }
    }
}
