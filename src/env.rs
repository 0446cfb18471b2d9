//! Environment overlays
//!
//! An `EnvironmentOverlay` is an ordered list of path entries per search
//! variable. Entries are rendered in insertion order, ahead of whatever the
//! parent process already had, so freshly installed libraries shadow
//! system copies of the same name. Rendering drops duplicate entries, which
//! makes applying the same overlay twice a no-op.

use crate::error::{ProvisionError, ProvisionResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Executable search path
pub const PATH: &str = "PATH";
/// pkg-config metadata search path
pub const PKG_CONFIG_PATH: &str = "PKG_CONFIG_PATH";
/// Runtime shared-library search path
pub const LD_LIBRARY_PATH: &str = "LD_LIBRARY_PATH";
/// Static link search path
pub const LIBRARY_PATH: &str = "LIBRARY_PATH";

#[cfg(windows)]
const SEPARATOR: char = ';';
#[cfg(not(windows))]
const SEPARATOR: char = ':';

/// Ordered path entries to prepend, keyed by variable name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentOverlay {
    vars: BTreeMap<String, Vec<PathBuf>>,
}

impl EnvironmentOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry to `var`, after entries already in the overlay
    pub fn push(&mut self, var: &str, entry: impl Into<PathBuf>) {
        let entry = entry.into();
        let entries = self.vars.entry(var.to_string()).or_default();
        if !entries.contains(&entry) {
            entries.push(entry);
        }
    }

    /// Expose an install prefix: `bin` on PATH, `lib` on both library
    /// paths and `lib/pkgconfig` on the pkg-config path
    pub fn add_install_prefix(&mut self, prefix: &Path) {
        let lib = prefix.join("lib");
        self.push(PATH, prefix.join("bin"));
        self.push(PKG_CONFIG_PATH, lib.join("pkgconfig"));
        self.push(LD_LIBRARY_PATH, lib.clone());
        self.push(LIBRARY_PATH, lib);
    }

    /// Entries for `var`, in render order
    pub fn entries(&self, var: &str) -> &[PathBuf] {
        self.vars.get(var).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Render against an inherited environment looked up through `base`
    pub fn render_with<F>(&self, base: F) -> Vec<(String, String)>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.vars
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(var, entries)| {
                let inherited = base(var).unwrap_or_default();
                let mut seen: Vec<String> = Vec::new();
                let overlay = entries.iter().map(|p| p.display().to_string());
                let parent = inherited
                    .split(SEPARATOR)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string);
                for entry in overlay.chain(parent) {
                    if !seen.contains(&entry) {
                        seen.push(entry);
                    }
                }
                (var.clone(), seen.join(&SEPARATOR.to_string()))
            })
            .collect()
    }

    /// Render against the current process environment
    pub fn render(&self) -> Vec<(String, String)> {
        self.render_with(|var| std::env::var(var).ok())
    }
}

/// Final destination of a configured environment
#[async_trait]
pub trait EnvironmentSink: Send + Sync {
    async fn apply(&self, overlay: &EnvironmentOverlay) -> ProvisionResult<()>;
}

/// Applies overlays to this process and, under GitHub Actions, to the
/// runner's `GITHUB_PATH` / `GITHUB_ENV` files so later steps inherit them
pub struct ProcessEnvironment {
    github_path: Option<PathBuf>,
    github_env: Option<PathBuf>,
}

impl ProcessEnvironment {
    /// Detect runner files from the environment
    pub fn detect() -> Self {
        Self {
            github_path: std::env::var_os("GITHUB_PATH").map(PathBuf::from),
            github_env: std::env::var_os("GITHUB_ENV").map(PathBuf::from),
        }
    }

    /// Use explicit runner files
    pub fn with_files(github_path: Option<PathBuf>, github_env: Option<PathBuf>) -> Self {
        Self {
            github_path,
            github_env,
        }
    }

    async fn append(path: &Path, content: &str) -> ProvisionResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| ProvisionError::io(format!("opening {}", path.display()), e))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| ProvisionError::io(format!("writing {}", path.display()), e))?;
        file.flush()
            .await
            .map_err(|e| ProvisionError::io(format!("writing {}", path.display()), e))
    }
}

#[async_trait]
impl EnvironmentSink for ProcessEnvironment {
    async fn apply(&self, overlay: &EnvironmentOverlay) -> ProvisionResult<()> {
        let rendered = overlay.render();

        for (var, value) in &rendered {
            debug!("{}={}", var, value);
            std::env::set_var(var, value);
        }

        // The runner prepends each GITHUB_PATH line, so write the entry that
        // must end up first last.
        if let Some(ref path) = self.github_path {
            let mut content = String::new();
            for entry in overlay.entries(PATH).iter().rev() {
                content.push_str(&entry.display().to_string());
                content.push('\n');
            }
            Self::append(path, &content).await?;
        }

        if let Some(ref path) = self.github_env {
            let mut content = String::new();
            for (var, value) in rendered.iter().filter(|(var, _)| var != PATH) {
                content.push_str(&format!("{}={}\n", var, value));
            }
            Self::append(path, &content).await?;
        }

        info!("Environment configured");
        Ok(())
    }
}
