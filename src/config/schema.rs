//! Configuration schema for setup-vapoursynth
//!
//! Configuration is stored at `~/.config/setup-vapoursynth/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Source build settings
    pub build: BuildConfig,

    /// Cache settings
    pub cache: CacheConfig,

    /// Version catalog settings
    pub catalog: CatalogConfig,

    /// Portable archive settings (Windows)
    pub archive: ArchiveConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Print build output as it is produced
    pub echo_output: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            echo_output: true,
        }
    }
}

/// Source build settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Directory holding one install prefix per library
    pub install_root: PathBuf,

    /// Directory for source clones and downloads
    pub work_dir: PathBuf,

    /// Parallel make jobs (unset = make's default)
    pub jobs: Option<u32>,

    /// Run the install step through sudo
    pub use_sudo: bool,

    /// zimg repository
    pub zimg_url: String,

    /// VapourSynth repository
    pub vapoursynth_url: String,

    /// Python interpreter used to build the wheel
    pub python: String,

    /// pip executable
    pub pip: String,

    /// OS packages installed before building VapourSynth
    pub system_packages: Vec<String>,

    /// Python packages installed before building VapourSynth
    pub python_packages: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            install_root: dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")),
            work_dir: std::env::temp_dir(),
            jobs: None,
            use_sudo: true,
            zimg_url: "https://github.com/sekrit-twc/zimg".to_string(),
            vapoursynth_url: "https://github.com/vapoursynth/vapoursynth".to_string(),
            python: "python".to_string(),
            pip: "pip".to_string(),
            system_packages: vec!["nasm".to_string()],
            python_packages: vec!["cython".to_string(), "wheel".to_string()],
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the build cache (default: true)
    pub enabled: bool,

    /// Directory of the local cache store
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("setup-vapoursynth"),
        }
    }
}

/// Version catalog configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Extra catalog merged over the built-in one
    pub path: Option<PathBuf>,
}

/// Portable archive configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Download URL; `{version}` is replaced by the VapourSynth ref
    pub url_template: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            url_template: "https://github.com/vapoursynth/vapoursynth/releases/download/{version}/VapourSynth64-Portable-{version}.zip".to_string(),
        }
    }
}

impl ArchiveConfig {
    /// Download URL for a VapourSynth ref
    pub fn url_for(&self, vs_ref: &str) -> String {
        self.url_template.replace("{version}", vs_ref)
    }
}

impl Config {
    /// Check settings serde cannot express; the error names the setting
    pub fn validate(&self) -> Result<(), String> {
        if !matches!(self.general.log_format.as_str(), "text" | "json") {
            return Err(format!(
                "general.log_format must be \"text\" or \"json\", got \"{}\"",
                self.general.log_format
            ));
        }
        if self.build.jobs == Some(0) {
            return Err("build.jobs must be at least 1".to_string());
        }
        if self.build.zimg_url.trim().is_empty() {
            return Err("build.zimg_url is empty".to_string());
        }
        if self.build.vapoursynth_url.trim().is_empty() {
            return Err("build.vapoursynth_url is empty".to_string());
        }
        if !self.archive.url_template.contains("{version}") {
            return Err("archive.url_template has no {version} placeholder".to_string());
        }
        Ok(())
    }
}
