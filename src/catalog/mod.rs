//! Version catalog
//!
//! Maps a requested version token to the pair of source refs that make up
//! one buildable combination. Resolution order:
//! 1. Direct version name (e.g. `R72`)
//! 2. Alias (e.g. `latest`, `72`)
//!
//! The built-in catalog is compiled into the binary; a user catalog file
//! can add versions or re-point aliases.

use crate::error::{ProvisionError, ProvisionResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

const BUILTIN_CATALOG: &str = include_str!("versions.toml");

/// One buildable VapourSynth + zimg combination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDescriptor {
    /// VapourSynth branch or tag
    pub vs_ref: String,

    /// zimg branch or tag VapourSynth is built against
    pub zimg_ref: String,

    /// Version string reported to the caller
    pub minor: String,
}

/// On-disk catalog layout
#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    versions: BTreeMap<String, VersionDescriptor>,

    #[serde(default)]
    aliases: BTreeMap<String, String>,
}

/// Immutable lookup table of known versions and aliases
#[derive(Debug, Clone)]
pub struct VersionCatalog {
    versions: BTreeMap<String, VersionDescriptor>,
    aliases: BTreeMap<String, String>,
}

impl VersionCatalog {
    /// The catalog shipped with the binary
    pub fn builtin() -> ProvisionResult<Self> {
        let catalog = Self::parse("built-in catalog", BUILTIN_CATALOG)?;
        catalog.validate("built-in catalog")?;
        Ok(catalog)
    }

    /// Load the built-in catalog, extended by an optional user catalog file
    pub async fn load(extra: Option<&Path>) -> ProvisionResult<Self> {
        let mut catalog = Self::parse("built-in catalog", BUILTIN_CATALOG)?;

        if let Some(path) = extra {
            let name = path.display().to_string();
            let content = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| ProvisionError::io(format!("reading catalog {}", name), e))?;
            debug!("Merging user catalog from {}", name);
            catalog.merge(Self::parse(&name, &content)?);
            catalog.validate(&name)?;
        } else {
            catalog.validate("built-in catalog")?;
        }

        Ok(catalog)
    }

    /// Parse a catalog from TOML without cross-checking aliases
    fn parse(source_name: &str, content: &str) -> ProvisionResult<Self> {
        let file: CatalogFile =
            toml::from_str(content).map_err(|e| ProvisionError::CatalogInvalid {
                source_name: source_name.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            versions: file.versions,
            aliases: file.aliases,
        })
    }

    /// Every alias must point at a known version
    fn validate(&self, source_name: &str) -> ProvisionResult<()> {
        for (alias, target) in &self.aliases {
            if !self.versions.contains_key(target) {
                return Err(ProvisionError::CatalogInvalid {
                    source_name: source_name.to_string(),
                    reason: format!("alias '{}' points to unknown version '{}'", alias, target),
                });
            }
        }
        Ok(())
    }

    /// Overlay another catalog; its entries win on conflict
    fn merge(&mut self, other: Self) {
        self.versions.extend(other.versions);
        self.aliases.extend(other.aliases);
    }

    /// Resolve a version token: direct match first, then alias
    pub fn resolve(&self, token: &str) -> ProvisionResult<&VersionDescriptor> {
        let token = token.trim();

        if let Some(version) = self.versions.get(token) {
            return Ok(version);
        }

        self.aliases
            .get(token)
            .and_then(|target| self.versions.get(target))
            .ok_or_else(|| ProvisionError::UnknownVersion(token.to_string()))
    }

    /// All versions, sorted by name
    pub fn versions(&self) -> impl Iterator<Item = (&str, &VersionDescriptor)> {
        self.versions.iter().map(|(name, v)| (name.as_str(), v))
    }

    /// Aliases that point at `name`
    pub fn aliases_for(&self, name: &str) -> Vec<&str> {
        self.aliases
            .iter()
            .filter(|(_, target)| target.as_str() == name)
            .map(|(alias, _)| alias.as_str())
            .collect()
    }
}
