//! Platform detection
//!
//! `Platform` selects the provisioning strategy; `PlatformFingerprint`
//! identifies the worker image for cache keys.

use std::fmt;
use tracing::debug;

/// Detected platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Linux - builds from source
    Linux,
    /// macOS - builds from source
    MacOS,
    /// Windows - uses the portable release archive
    Windows,
    /// Unsupported platform
    Unsupported,
}

impl Platform {
    /// Detect the current platform
    pub fn detect() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    /// Map an OS name as reported by `std::env::consts::OS`
    pub fn from_os(os: &str) -> Self {
        match os {
            "linux" => Platform::Linux,
            "macos" => Platform::MacOS,
            "windows" => Platform::Windows,
            _ => Platform::Unsupported,
        }
    }

    /// Get a human-readable platform name
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Linux => "Linux",
            Platform::MacOS => "macOS",
            Platform::Windows => "Windows",
            Platform::Unsupported => "Unsupported",
        }
    }
}

/// OS family and release of the worker, used to scope cache entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformFingerprint {
    /// Distribution or OS family (e.g. `ubuntu`, `macos`)
    pub os_family: String,
    /// Release within the family (e.g. `22.04`), if known
    pub os_release: Option<String>,
}

impl PlatformFingerprint {
    /// Create a fingerprint from explicit parts
    pub fn new(os_family: impl Into<String>, os_release: Option<String>) -> Self {
        Self {
            os_family: os_family.into().to_lowercase(),
            os_release,
        }
    }

    /// Detect the fingerprint of the running worker
    pub async fn detect() -> Self {
        if cfg!(target_os = "linux") {
            match tokio::fs::read_to_string("/etc/os-release").await {
                Ok(content) => {
                    if let Some(fingerprint) = Self::from_os_release(&content) {
                        debug!("Detected platform {}", fingerprint);
                        return fingerprint;
                    }
                }
                Err(e) => debug!("Could not read /etc/os-release: {}", e),
            }
        }

        Self::new(std::env::consts::OS, None)
    }

    /// Parse the `ID` and `VERSION_ID` fields of an os-release file
    pub fn from_os_release(content: &str) -> Option<Self> {
        let mut id = None;
        let mut version = None;

        for line in content.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"').trim_matches('\'');
            if value.is_empty() {
                continue;
            }
            match key.trim() {
                "ID" => id = Some(value.to_string()),
                "VERSION_ID" => version = Some(value.to_string()),
                _ => {}
            }
        }

        id.map(|id| Self::new(id, version))
    }
}

impl fmt::Display for PlatformFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.os_release {
            Some(release) => write!(f, "{}-{}", self.os_family, release),
            None => write!(f, "{}", self.os_family),
        }
    }
}
