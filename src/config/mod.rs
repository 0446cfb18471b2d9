//! Configuration management for setup-vapoursynth

pub mod schema;

pub use schema::Config;

use crate::error::{ProvisionError, ProvisionResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("setup-vapoursynth")
            .join("config.toml")
    }

    /// Load configuration, using built-in defaults if the file does not exist
    pub async fn load(&self) -> ProvisionResult<Config> {
        if !self.config_path.exists() {
            debug!(
                "No config at {}, using built-in defaults",
                self.config_path.display()
            );
            return Ok(Config::default());
        }

        let config = self.load_from_file(&self.config_path).await?;
        debug!(
            "Loaded config from {} (install root {}, cache {})",
            self.config_path.display(),
            config.build.install_root.display(),
            if config.cache.enabled { "on" } else { "off" }
        );
        Ok(config)
    }

    /// Parse and validate a config file
    pub async fn load_from_file(&self, path: &Path) -> ProvisionResult<Config> {
        let invalid = |reason: String| ProvisionError::ConfigInvalid {
            path: path.to_path_buf(),
            reason,
        };

        let content = fs::read_to_string(path).await.map_err(|e| {
            ProvisionError::io(format!("reading config from {}", path.display()), e)
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| invalid(e.to_string()))?;
        config.validate().map_err(invalid)?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> ProvisionResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            ProvisionError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> ProvisionResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ProvisionError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
