//! Test doubles shared by unit tests

use crate::build::BuildHooks;
use crate::cache::{CacheKey, CacheKeySet, CacheStore};
use crate::env::{EnvironmentOverlay, EnvironmentSink};
use crate::error::{ProvisionError, ProvisionResult};
use crate::process::{CommandSpec, ProcessRunner};
use crate::provision::archive::{ArchiveFetcher, PORTABLE_DIR};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Records commands instead of running them
#[derive(Default)]
pub struct RecordingRunner {
    commands: Mutex<Vec<CommandSpec>>,
    fail_prefix: Option<String>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail (with exit code 1) the first command whose rendering starts with `prefix`
    pub fn fail_on(mut self, prefix: &str) -> Self {
        self.fail_prefix = Some(prefix.to_string());
        self
    }

    pub fn commands(&self) -> Vec<CommandSpec> {
        self.commands.lock().unwrap().clone()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.commands().iter().map(ToString::to_string).collect()
    }
}

#[async_trait]
impl ProcessRunner for RecordingRunner {
    async fn run(&self, command: &CommandSpec) -> ProvisionResult<()> {
        self.commands.lock().unwrap().push(command.clone());
        let line = command.to_string();
        match self.fail_prefix {
            Some(ref prefix) if line.starts_with(prefix.as_str()) => {
                Err(ProvisionError::CommandExit {
                    command: line,
                    code: 1,
                    output: "error: simulated failure".to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Records hook invocations
#[derive(Default)]
pub struct RecordingHooks {
    calls: Mutex<Vec<&'static str>>,
    clone_dirs: Mutex<Vec<PathBuf>>,
    fail_before: bool,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_before(mut self) -> Self {
        self.fail_before = true;
        self
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clone_dirs(&self) -> Vec<PathBuf> {
        self.clone_dirs.lock().unwrap().clone()
    }
}

#[async_trait]
impl BuildHooks for RecordingHooks {
    async fn before_build(&self, clone_dir: &Path) -> ProvisionResult<()> {
        self.calls.lock().unwrap().push("before");
        self.clone_dirs.lock().unwrap().push(clone_dir.to_path_buf());
        if self.fail_before {
            return Err(ProvisionError::Internal("pre-build hook failed".to_string()));
        }
        Ok(())
    }

    async fn after_build(&self, clone_dir: &Path) -> ProvisionResult<()> {
        self.calls.lock().unwrap().push("after");
        self.clone_dirs.lock().unwrap().push(clone_dir.to_path_buf());
        Ok(())
    }
}

/// In-memory cache keyed by exact key or key prefix
#[derive(Default)]
pub struct FakeCacheStore {
    stored: Mutex<Vec<String>>,
    saves: Mutex<Vec<(Vec<PathBuf>, CacheKey)>>,
    restores: Mutex<usize>,
    fail_restore: bool,
    fail_save: bool,
}

impl FakeCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend an entry exists under `key`
    pub fn with_entry(self, key: &str) -> Self {
        self.stored.lock().unwrap().push(key.to_string());
        self
    }

    pub fn failing_restore(mut self) -> Self {
        self.fail_restore = true;
        self
    }

    pub fn failing_save(mut self) -> Self {
        self.fail_save = true;
        self
    }

    pub fn saves(&self) -> Vec<(Vec<PathBuf>, CacheKey)> {
        self.saves.lock().unwrap().clone()
    }

    pub fn restore_calls(&self) -> usize {
        *self.restores.lock().unwrap()
    }
}

#[async_trait]
impl CacheStore for FakeCacheStore {
    async fn restore(
        &self,
        _dirs: &[PathBuf],
        keys: &CacheKeySet,
    ) -> ProvisionResult<Option<CacheKey>> {
        *self.restores.lock().unwrap() += 1;
        if self.fail_restore {
            return Err(ProvisionError::cache("backend unreachable"));
        }
        let stored = self.stored.lock().unwrap();
        for key in keys.iter() {
            if let Some(hit) = stored.iter().find(|s| s.starts_with(key.as_str())) {
                return Ok(Some(CacheKey::new(hit.clone())));
            }
        }
        Ok(None)
    }

    async fn save(&self, dirs: &[PathBuf], key: &CacheKey) -> ProvisionResult<()> {
        self.saves.lock().unwrap().push((dirs.to_vec(), key.clone()));
        if self.fail_save {
            return Err(ProvisionError::cache("upload rejected"));
        }
        self.stored.lock().unwrap().push(key.as_str().to_string());
        Ok(())
    }
}

/// Captures applied overlays
#[derive(Default)]
pub struct RecordingSink {
    applied: Mutex<Vec<EnvironmentOverlay>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn applied(&self) -> Vec<EnvironmentOverlay> {
        self.applied.lock().unwrap().clone()
    }
}

#[async_trait]
impl EnvironmentSink for RecordingSink {
    async fn apply(&self, overlay: &EnvironmentOverlay) -> ProvisionResult<()> {
        self.applied.lock().unwrap().push(overlay.clone());
        Ok(())
    }
}

/// Writes a portable layout instead of downloading and unzipping
#[derive(Default)]
pub struct FakeFetcher {
    urls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    /// Name of the wheel placed in every extracted layout
    pub const WHEEL: &'static str = "VapourSynth-72-cp312-win_amd64.whl";

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    /// Lay out `dest` the way the portable zip unpacks
    pub fn write_portable_layout(dest: &Path) {
        let wheel_dir = dest.join(PORTABLE_DIR).join("wheel");
        std::fs::create_dir_all(&wheel_dir).unwrap();
        std::fs::write(wheel_dir.join(Self::WHEEL), b"wheel").unwrap();
    }
}

#[async_trait]
impl ArchiveFetcher for FakeFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> ProvisionResult<()> {
        self.urls.lock().unwrap().push(url.to_string());
        std::fs::write(dest, b"zip").unwrap();
        Ok(())
    }

    async fn extract(&self, _archive: &Path, dest: &Path) -> ProvisionResult<()> {
        Self::write_portable_layout(dest);
        Ok(())
    }
}
