//! Library-specific build hooks
//!
//! Hooks run around the generic pipeline: `before_build` ahead of the
//! clone, `after_build` inside the finished clone once `make install` has
//! succeeded.

use crate::env::EnvironmentOverlay;
use crate::error::{ProvisionError, ProvisionResult};
use crate::platform::Platform;
use crate::process::{CommandSpec, ProcessRunner};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[async_trait]
pub trait BuildHooks: Send + Sync {
    /// Runs before the clone; `clone_dir` does not exist yet
    async fn before_build(&self, _clone_dir: &Path) -> ProvisionResult<()> {
        Ok(())
    }

    /// Runs after a successful install, from inside the clone
    async fn after_build(&self, _clone_dir: &Path) -> ProvisionResult<()> {
        Ok(())
    }
}

/// No extra steps
pub struct NoHooks;

impl BuildHooks for NoHooks {}

/// Runs several hooks in order, stopping at the first failure
#[derive(Default)]
pub struct HookSet(Vec<Box<dyn BuildHooks>>);

impl HookSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, hook: impl BuildHooks + 'static) -> Self {
        self.0.push(Box::new(hook));
        self
    }
}

#[async_trait]
impl BuildHooks for HookSet {
    async fn before_build(&self, clone_dir: &Path) -> ProvisionResult<()> {
        for hook in &self.0 {
            hook.before_build(clone_dir).await?;
        }
        Ok(())
    }

    async fn after_build(&self, clone_dir: &Path) -> ProvisionResult<()> {
        for hook in &self.0 {
            hook.after_build(clone_dir).await?;
        }
        Ok(())
    }
}

/// Installs the assembler and Python build tooling VapourSynth needs
pub struct SystemPrerequisites {
    runner: Arc<dyn ProcessRunner>,
    platform: Platform,
    system_packages: Vec<String>,
    pip: String,
    python_packages: Vec<String>,
    use_sudo: bool,
}

impl SystemPrerequisites {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        platform: Platform,
        system_packages: Vec<String>,
        pip: impl Into<String>,
        python_packages: Vec<String>,
        use_sudo: bool,
    ) -> Self {
        Self {
            runner,
            platform,
            system_packages,
            pip: pip.into(),
            python_packages,
            use_sudo,
        }
    }

    fn package_command(&self) -> Option<CommandSpec> {
        if self.system_packages.is_empty() {
            return None;
        }
        match self.platform {
            Platform::Linux => {
                let apt = if self.use_sudo {
                    CommandSpec::new("sudo").arg("apt-get")
                } else {
                    CommandSpec::new("apt-get")
                };
                Some(
                    apt.args(["install", "--yes"])
                        .args(self.system_packages.iter().cloned()),
                )
            }
            Platform::MacOS => Some(
                CommandSpec::new("brew")
                    .arg("install")
                    .args(self.system_packages.iter().cloned()),
            ),
            _ => None,
        }
    }
}

#[async_trait]
impl BuildHooks for SystemPrerequisites {
    async fn before_build(&self, _clone_dir: &Path) -> ProvisionResult<()> {
        match self.package_command() {
            Some(command) => {
                info!("Installing system packages: {}", self.system_packages.join(" "));
                self.runner.run(&command).await?;
            }
            None if !self.system_packages.is_empty() => {
                warn!(
                    "No package manager known for {}, skipping {}",
                    self.platform.name(),
                    self.system_packages.join(" ")
                );
            }
            None => {}
        }

        if !self.python_packages.is_empty() {
            info!("Installing Python packages: {}", self.python_packages.join(" "));
            let command = CommandSpec::new(&self.pip)
                .arg("install")
                .args(self.python_packages.iter().cloned());
            self.runner.run(&command).await?;
        }
        Ok(())
    }
}

/// Builds and installs the Python extension, keeping the wheel so a cache
/// hit can reinstall it without rebuilding
pub struct PythonWheel {
    runner: Arc<dyn ProcessRunner>,
    overlay: EnvironmentOverlay,
    python: String,
    pip: String,
    wheel_dir: PathBuf,
}

impl PythonWheel {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        overlay: EnvironmentOverlay,
        python: impl Into<String>,
        pip: impl Into<String>,
        wheel_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            overlay,
            python: python.into(),
            pip: pip.into(),
            wheel_dir: wheel_dir.into(),
        }
    }

    async fn collect_wheels(&self, dist: &Path) -> ProvisionResult<usize> {
        tokio::fs::create_dir_all(&self.wheel_dir)
            .await
            .map_err(|e| ProvisionError::io(format!("creating {}", self.wheel_dir.display()), e))?;

        let mut entries = tokio::fs::read_dir(dist)
            .await
            .map_err(|e| ProvisionError::io(format!("reading {}", dist.display()), e))?;

        let mut copied = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ProvisionError::io(format!("reading {}", dist.display()), e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("whl") {
                continue;
            }
            let Some(name) = path.file_name() else {
                continue;
            };
            let target = self.wheel_dir.join(name);
            debug!("Keeping wheel {}", target.display());
            tokio::fs::copy(&path, &target)
                .await
                .map_err(|e| ProvisionError::io(format!("copying {}", path.display()), e))?;
            copied += 1;
        }
        Ok(copied)
    }
}

#[async_trait]
impl BuildHooks for PythonWheel {
    async fn after_build(&self, clone_dir: &Path) -> ProvisionResult<()> {
        let env = self.overlay.render();

        info!("Building Python wheel");
        self.runner
            .run(
                &CommandSpec::new(&self.python)
                    .args(["setup.py", "bdist_wheel"])
                    .cwd(clone_dir)
                    .envs(env.clone()),
            )
            .await?;

        self.runner
            .run(
                &CommandSpec::new(&self.pip)
                    .args(["install", "."])
                    .cwd(clone_dir)
                    .envs(env),
            )
            .await?;

        let dist = clone_dir.join("dist");
        if dist.is_dir() {
            let copied = self.collect_wheels(&dist).await?;
            if copied == 0 {
                warn!("No wheel found in {}", dist.display());
            }
        } else {
            warn!("No dist directory at {}, wheel not kept", dist.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{RecordingHooks, RecordingRunner};
    use tempfile::TempDir;

    #[tokio::test]
    async fn no_hooks_is_noop() {
        let dir = Path::new("/tmp/none");
        NoHooks.before_build(dir).await.unwrap();
        NoHooks.after_build(dir).await.unwrap();
    }

    #[tokio::test]
    async fn hook_set_stops_at_first_failure() {
        let first = RecordingHooks::new().fail_before();
        let set = HookSet::new().with(first);
        let err = set.before_build(Path::new("/tmp/x")).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn prerequisites_on_linux() {
        let runner = Arc::new(RecordingRunner::new());
        let hook = SystemPrerequisites::new(
            runner.clone(),
            Platform::Linux,
            vec!["nasm".to_string()],
            "pip",
            vec!["cython".to_string(), "wheel".to_string()],
            true,
        );

        hook.before_build(Path::new("/tmp/vs-git")).await.unwrap();

        assert_eq!(
            runner.command_lines(),
            vec![
                "sudo apt-get install --yes nasm".to_string(),
                "pip install cython wheel".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn prerequisites_on_macos() {
        let runner = Arc::new(RecordingRunner::new());
        let hook = SystemPrerequisites::new(
            runner.clone(),
            Platform::MacOS,
            vec!["nasm".to_string()],
            "pip3",
            vec![],
            true,
        );

        hook.before_build(Path::new("/tmp/vs-git")).await.unwrap();

        assert_eq!(runner.command_lines(), vec!["brew install nasm".to_string()]);
    }

    #[tokio::test]
    async fn wheel_is_built_installed_and_kept() {
        let temp = TempDir::new().unwrap();
        let clone_dir = temp.path().join("vapoursynth-git");
        std::fs::create_dir_all(clone_dir.join("dist")).unwrap();
        std::fs::write(clone_dir.join("dist/VapourSynth-72-cp312-linux.whl"), "wheel").unwrap();
        std::fs::write(clone_dir.join("dist/notes.txt"), "skip").unwrap();

        let runner = Arc::new(RecordingRunner::new());
        let wheel_dir = temp.path().join("install/vs-wheel");
        let hook = PythonWheel::new(
            runner.clone(),
            EnvironmentOverlay::new(),
            "python",
            "pip",
            &wheel_dir,
        );

        hook.after_build(&clone_dir).await.unwrap();

        assert_eq!(
            runner.command_lines(),
            vec![
                "python setup.py bdist_wheel".to_string(),
                "pip install .".to_string(),
            ]
        );
        assert!(wheel_dir.join("VapourSynth-72-cp312-linux.whl").exists());
        assert!(!wheel_dir.join("notes.txt").exists());
    }

    #[tokio::test]
    async fn failed_wheel_build_skips_install() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(RecordingRunner::new().fail_on("python setup.py"));
        let hook = PythonWheel::new(
            runner.clone(),
            EnvironmentOverlay::new(),
            "python",
            "pip",
            temp.path().join("vs-wheel"),
        );

        assert!(hook.after_build(temp.path()).await.is_err());
        assert_eq!(runner.command_lines().len(), 1);
    }
}
