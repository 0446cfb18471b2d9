//! Tiered cache keys
//!
//! Keys are derived from the version refs and the worker fingerprint,
//! ordered from most to least specific:
//!
//! | Tier | Key |
//! |------|-----|
//! | 1 | `vapoursynth-<vs>-zimg-<zimg>-<family>-<release>` |
//! | 2 | `vapoursynth-<vs>-zimg-<zimg>-<family>` |
//! | 3 | `vapoursynth-<vs>-zimg-<zimg>` |
//!
//! Entries are always saved under the first key.

use crate::catalog::VersionDescriptor;
use crate::platform::PlatformFingerprint;
use std::fmt;

/// A single cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Candidate keys, most specific first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeySet {
    keys: Vec<CacheKey>,
}

impl CacheKeySet {
    /// Derive the key tiers for a version on a platform
    pub fn derive(version: &VersionDescriptor, platform: &PlatformFingerprint) -> Self {
        let base = format!(
            "vapoursynth-{}-zimg-{}",
            sanitize(&version.vs_ref),
            sanitize(&version.zimg_ref)
        );
        let family = format!("{}-{}", base, sanitize(&platform.os_family));

        let mut keys = Vec::with_capacity(3);
        if let Some(ref release) = platform.os_release {
            keys.push(CacheKey(format!("{}-{}", family, sanitize(release))));
        }
        keys.push(CacheKey(family));
        keys.push(CacheKey(base));

        Self { keys }
    }

    /// The most specific key; entries are saved under it
    pub fn primary(&self) -> &CacheKey {
        &self.keys[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &CacheKey> {
        self.keys.iter()
    }
}

impl fmt::Display for CacheKeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = self.keys.iter().map(CacheKey::as_str).collect();
        f.write_str(&keys.join(", "))
    }
}

/// Keep key components to a filename- and log-safe alphabet
fn sanitize(component: &str) -> String {
    component
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
