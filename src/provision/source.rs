//! Source build of zimg followed by VapourSynth

use super::Provisioner;
use crate::build::{
    BuildPipeline, BuildRequest, HookSet, NoHooks, PythonWheel, SystemPrerequisites,
};
use crate::catalog::VersionDescriptor;
use crate::config::schema::BuildConfig;
use crate::env::EnvironmentOverlay;
use crate::error::{ProvisionError, ProvisionResult};
use crate::platform::Platform;
use crate::process::{CommandSpec, ProcessRunner};
use crate::ui::UiContext;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

const ZIMG_ID: &str = "zimg";
const VAPOURSYNTH_ID: &str = "vapoursynth";
const WHEEL_SUBDIR: &str = "vs-wheel";

/// Builds zimg, then VapourSynth against it
pub struct SourceBuildProvisioner {
    platform: Platform,
    config: BuildConfig,
    runner: Arc<dyn ProcessRunner>,
    pipeline: BuildPipeline,
}

impl SourceBuildProvisioner {
    pub fn new(
        platform: Platform,
        config: BuildConfig,
        runner: Arc<dyn ProcessRunner>,
        ui: UiContext,
    ) -> Self {
        let pipeline = BuildPipeline::new(runner.clone(), config.clone(), ui);
        Self {
            platform,
            config,
            runner,
            pipeline,
        }
    }

    fn wheel_dir(&self) -> PathBuf {
        self.config.install_root.join(WHEEL_SUBDIR)
    }

    fn vapoursynth_hooks(&self, overlay: &EnvironmentOverlay) -> HookSet {
        HookSet::new()
            .with(SystemPrerequisites::new(
                self.runner.clone(),
                self.platform,
                self.config.system_packages.clone(),
                self.config.pip.clone(),
                self.config.python_packages.clone(),
                self.config.use_sudo,
            ))
            .with(PythonWheel::new(
                self.runner.clone(),
                overlay.clone(),
                self.config.python.clone(),
                self.config.pip.clone(),
                self.wheel_dir(),
            ))
    }
}

#[async_trait]
impl Provisioner for SourceBuildProvisioner {
    async fn provision(&self, version: &VersionDescriptor) -> ProvisionResult<EnvironmentOverlay> {
        let zimg = self
            .pipeline
            .build(
                &BuildRequest {
                    source_url: &self.config.zimg_url,
                    library_id: ZIMG_ID,
                    git_ref: &version.zimg_ref,
                    install_subdir: ZIMG_ID,
                },
                &NoHooks,
                &EnvironmentOverlay::new(),
            )
            .await?;

        let mut overlay = EnvironmentOverlay::new();
        overlay.add_install_prefix(&zimg.root);

        // The wheel hook sees both prefixes so the extension links against them
        let mut wheel_overlay = overlay.clone();
        wheel_overlay.add_install_prefix(&self.pipeline.prefix(VAPOURSYNTH_ID).root);

        let vapoursynth = self
            .pipeline
            .build(
                &BuildRequest {
                    source_url: &self.config.vapoursynth_url,
                    library_id: VAPOURSYNTH_ID,
                    git_ref: &version.vs_ref,
                    install_subdir: VAPOURSYNTH_ID,
                },
                &self.vapoursynth_hooks(&wheel_overlay),
                &overlay,
            )
            .await?;

        overlay.add_install_prefix(&vapoursynth.root);
        Ok(overlay)
    }

    fn cached_dirs(&self, _version: &VersionDescriptor) -> Vec<PathBuf> {
        vec![
            self.pipeline.prefix(ZIMG_ID).root,
            self.pipeline.prefix(VAPOURSYNTH_ID).root,
            self.wheel_dir(),
        ]
    }

    fn environment(&self, _version: &VersionDescriptor) -> EnvironmentOverlay {
        let mut overlay = EnvironmentOverlay::new();
        overlay.add_install_prefix(&self.pipeline.prefix(ZIMG_ID).root);
        overlay.add_install_prefix(&self.pipeline.prefix(VAPOURSYNTH_ID).root);
        overlay
    }

    /// The Python module lives in site-packages, outside the cached trees,
    /// so reinstall it from the kept wheel
    async fn on_restored(&self, version: &VersionDescriptor) -> ProvisionResult<()> {
        let wheel_dir = self.wheel_dir();
        let mut wheels = Vec::new();
        if wheel_dir.is_dir() {
            let mut entries = tokio::fs::read_dir(&wheel_dir).await.map_err(|e| {
                ProvisionError::io(format!("reading {}", wheel_dir.display()), e)
            })?;
            while let Some(entry) = entries.next_entry().await.map_err(|e| {
                ProvisionError::io(format!("reading {}", wheel_dir.display()), e)
            })? {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("whl") {
                    wheels.push(path);
                }
            }
        }

        if wheels.is_empty() {
            warn!("No cached wheel in {}, Python module not installed", wheel_dir.display());
            return Ok(());
        }

        wheels.sort();
        for wheel in wheels {
            info!("Installing cached wheel {}", wheel.display());
            self.runner
                .run(
                    &CommandSpec::new(&self.config.pip)
                        .arg("install")
                        .arg(wheel.display().to_string())
                        .envs(self.environment(version).render()),
                )
                .await?;
        }
        Ok(())
    }

    fn provisioner_name(&self) -> &'static str {
        "source build"
    }
}
