//! Source build pipeline
//!
//! Compiles one autotools library from a git ref into a fixed install
//! prefix. Stages run strictly in order and the first failure aborts the
//! build; nothing is cleaned up afterwards, so a failed library's prefix
//! must be considered tainted until a later build succeeds.

use crate::build::hooks::BuildHooks;
use crate::config::schema::BuildConfig;
use crate::env::EnvironmentOverlay;
use crate::error::{ProvisionError, ProvisionResult};
use crate::process::{CommandSpec, ProcessRunner};
use crate::ui::{LogGroup, UiContext};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    /// `before_build` hook
    Prepare,
    /// Shallow clone of the ref
    Clone,
    /// `./autogen.sh`
    Autogen,
    /// `./configure --prefix=...`
    Configure,
    /// `make`
    Make,
    /// `make install`
    Install,
    /// `after_build` hook
    PostInstall,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Prepare => "prepare",
            Self::Clone => "clone",
            Self::Autogen => "autogen",
            Self::Configure => "configure",
            Self::Make => "make",
            Self::Install => "install",
            Self::PostInstall => "post-install",
        };
        write!(f, "{}", name)
    }
}

/// Install location of one library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPrefix {
    /// Prefix root passed to `configure --prefix`
    pub root: PathBuf,
}

impl InstallPrefix {
    pub fn new(install_root: &Path, subdir: &str) -> Self {
        Self {
            root: install_root.join(subdir),
        }
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    pub fn lib_dir(&self) -> PathBuf {
        self.root.join("lib")
    }

    pub fn pkgconfig_dir(&self) -> PathBuf {
        self.lib_dir().join("pkgconfig")
    }
}

/// What to build
#[derive(Debug, Clone)]
pub struct BuildRequest<'a> {
    /// Git repository URL
    pub source_url: &'a str,
    /// Stable id; names the clone directory
    pub library_id: &'a str,
    /// Branch or tag to check out
    pub git_ref: &'a str,
    /// Install prefix, relative to the install root
    pub install_subdir: &'a str,
}

/// Runs the clone / autogen / configure / make / install sequence
pub struct BuildPipeline {
    runner: Arc<dyn ProcessRunner>,
    config: BuildConfig,
    ui: UiContext,
}

impl BuildPipeline {
    pub fn new(runner: Arc<dyn ProcessRunner>, config: BuildConfig, ui: UiContext) -> Self {
        Self { runner, config, ui }
    }

    /// Clone target for a library id
    pub fn clone_dir(&self, library_id: &str) -> PathBuf {
        self.config.work_dir.join(format!("{}-git", library_id))
    }

    /// Install prefix for a subdir of the install root
    pub fn prefix(&self, install_subdir: &str) -> InstallPrefix {
        InstallPrefix::new(&self.config.install_root, install_subdir)
    }

    /// Build and install one library.
    ///
    /// `overlay` is layered over the process environment for every stage
    /// so the configure step can find previously built dependencies.
    pub async fn build(
        &self,
        request: &BuildRequest<'_>,
        hooks: &dyn BuildHooks,
        overlay: &EnvironmentOverlay,
    ) -> ProvisionResult<InstallPrefix> {
        let id = request.library_id;
        if id.trim().is_empty() {
            return Err(ProvisionError::InvalidInput(
                "library id must not be empty".to_string(),
            ));
        }

        let _group = LogGroup::start(
            &self.ui,
            &format!("Installing Building Tool for: {}@{}", id, request.git_ref),
        );

        let clone_dir = self.clone_dir(id);
        let prefix = self.prefix(request.install_subdir);
        let env = overlay.render();

        hooks
            .before_build(&clone_dir)
            .await
            .map_err(|e| e.in_stage(id, BuildStage::Prepare))?;

        self.remove_stale_clone(&clone_dir)
            .await
            .map_err(|e| e.in_stage(id, BuildStage::Clone))?;

        info!("Cloning {}", id);
        self.stage(
            id,
            BuildStage::Clone,
            CommandSpec::new("git")
                .arg("clone")
                .arg(request.source_url)
                .args(["--depth", "1", "--branch"])
                .arg(request.git_ref)
                .arg(clone_dir.display().to_string())
                .envs(env.clone()),
        )
        .await?;

        info!("Compiling {}", id);
        self.stage(
            id,
            BuildStage::Autogen,
            CommandSpec::new("./autogen.sh")
                .cwd(&clone_dir)
                .envs(env.clone()),
        )
        .await?;

        self.stage(
            id,
            BuildStage::Configure,
            CommandSpec::new("./configure")
                .arg(format!("--prefix={}/", prefix.root.display()))
                .cwd(&clone_dir)
                .envs(env.clone()),
        )
        .await?;

        let mut make = CommandSpec::new("make").cwd(&clone_dir).envs(env.clone());
        if let Some(jobs) = self.config.jobs {
            make = make.arg(format!("-j{}", jobs));
        }
        self.stage(id, BuildStage::Make, make).await?;

        let install = if self.config.use_sudo {
            CommandSpec::new("sudo").args(["make", "install"])
        } else {
            CommandSpec::new("make").arg("install")
        };
        self.stage(
            id,
            BuildStage::Install,
            install.cwd(&clone_dir).envs(env),
        )
        .await?;

        hooks
            .after_build(&clone_dir)
            .await
            .map_err(|e| e.in_stage(id, BuildStage::PostInstall))?;

        info!("Installed {} into {}", id, prefix.root.display());
        Ok(prefix)
    }

    async fn stage(
        &self,
        library_id: &str,
        stage: BuildStage,
        command: CommandSpec,
    ) -> ProvisionResult<()> {
        debug!("[{}] {}: {}", library_id, stage, command);
        self.runner
            .run(&command)
            .await
            .map_err(|e| e.in_stage(library_id, stage))
    }

    /// A clone left behind by an earlier failed run would make `git clone` fail
    async fn remove_stale_clone(&self, clone_dir: &Path) -> ProvisionResult<()> {
        if clone_dir.exists() {
            debug!("Removing stale clone {}", clone_dir.display());
            tokio::fs::remove_dir_all(clone_dir).await.map_err(|e| {
                ProvisionError::io(format!("removing {}", clone_dir.display()), e)
            })?;
        }
        Ok(())
    }
}
