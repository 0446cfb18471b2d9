//! Provisioning strategies
//!
//! A provisioner knows how to produce a VapourSynth installation on one
//! kind of host and which directories make up that installation:
//! - Linux / macOS: build zimg and VapourSynth from source
//! - Windows: unpack the portable release archive

pub mod archive;
pub mod source;

pub use archive::{ArchiveFetcher, ArchiveProvisioner, HttpArchiveFetcher};
pub use source::SourceBuildProvisioner;

use crate::catalog::VersionDescriptor;
use crate::config::Config;
use crate::env::EnvironmentOverlay;
use crate::error::{ProvisionError, ProvisionResult};
use crate::platform::Platform;
use crate::process::ProcessRunner;
use crate::ui::UiContext;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Produces an installation of one catalog version
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Install `version` from scratch and return its environment
    async fn provision(&self, version: &VersionDescriptor) -> ProvisionResult<EnvironmentOverlay>;

    /// Directories that together hold a complete installation
    fn cached_dirs(&self, version: &VersionDescriptor) -> Vec<PathBuf>;

    /// Environment of an installation already present in `cached_dirs`
    fn environment(&self, version: &VersionDescriptor) -> EnvironmentOverlay;

    /// Finish an installation restored from cache
    async fn on_restored(&self, _version: &VersionDescriptor) -> ProvisionResult<()> {
        Ok(())
    }

    /// Get the human-readable provisioner name for display
    fn provisioner_name(&self) -> &'static str;
}

/// Create the provisioner for `platform`
pub fn create_provisioner(
    platform: Platform,
    config: &Config,
    runner: Arc<dyn ProcessRunner>,
    ui: UiContext,
) -> ProvisionResult<Box<dyn Provisioner>> {
    match platform {
        Platform::Linux | Platform::MacOS => Ok(Box::new(SourceBuildProvisioner::new(
            platform,
            config.build.clone(),
            runner,
            ui,
        ))),
        Platform::Windows => Ok(Box::new(ArchiveProvisioner::new(
            config.archive.clone(),
            config.build.clone(),
            runner,
            Arc::new(HttpArchiveFetcher),
        ))),
        Platform::Unsupported => Err(ProvisionError::UnsupportedPlatform(
            std::env::consts::OS.to_string(),
        )),
    }
}
