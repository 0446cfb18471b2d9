//! Error types for setup-vapoursynth
//!
//! All modules use `ProvisionResult<T>` as their return type.

use crate::build::BuildStage;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for provisioning operations
pub type ProvisionResult<T> = Result<T, ProvisionError>;

/// All errors that can occur while provisioning
#[derive(Error, Debug)]
pub enum ProvisionError {
    // Resolution errors
    #[error("Unknown version {0}")]
    UnknownVersion(String),

    #[error("Invalid version catalog {source_name}: {reason}")]
    CatalogInvalid { source_name: String, reason: String },

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("{0}")]
    InvalidInput(String),

    // Build errors
    #[error("Build of {library} failed at stage {stage}: {source}")]
    Stage {
        library: String,
        stage: BuildStage,
        #[source]
        source: Box<ProvisionError>,
    },

    #[error("Command `{command}` exited with code {code}")]
    CommandExit {
        command: String,
        code: i32,
        output: String,
    },

    #[error("Command failed to start: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // Cache errors
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    // Archive errors
    #[error("Download failed: {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("Failed to unpack archive {path}: {reason}")]
    Archive { path: PathBuf, reason: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProvisionError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a cache unavailable error
    pub fn cache(reason: impl Into<String>) -> Self {
        Self::CacheUnavailable(reason.into())
    }

    /// Attribute this error to a build stage of `library`
    pub fn in_stage(self, library: impl Into<String>, stage: BuildStage) -> Self {
        Self::Stage {
            library: library.into(),
            stage,
            source: Box::new(self),
        }
    }

    /// Library and stage of a failed build, if this is a stage error
    pub fn failed_stage(&self) -> Option<(&str, BuildStage)> {
        match self {
            Self::Stage { library, stage, .. } => Some((library.as_str(), *stage)),
            _ => None,
        }
    }

    /// Tail of the failing command's output, if any was captured
    pub fn command_output(&self) -> Option<&str> {
        match self {
            Self::Stage { source, .. } => source.command_output(),
            Self::CommandExit { output, .. } if !output.is_empty() => Some(output.as_str()),
            _ => None,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::UnknownVersion(_) => Some("Run: setup-vapoursynth versions"),
            Self::UnsupportedPlatform(_) => {
                Some("Supported platforms are Linux and macOS (source build) and Windows (portable archive)")
            }
            Self::ConfigInvalid { .. } => Some("Run: setup-vapoursynth config show"),
            Self::Stage {
                stage: BuildStage::Install,
                ..
            } => Some("Set build.use_sudo = false when the install root is writable"),
            _ => None,
        }
    }
}
