//! Build artifact cache
//!
//! Installed prefixes are cached as directory trees addressed by tiered
//! keys derived from the version refs and the worker platform.
//!
//! # Lookup
//!
//! | Outcome | Effect |
//! |---------|--------|
//! | Hit | Trees restored in place, no build |
//! | Miss | Full source build, then save under the most specific key |
//! | Store error | Treated as a miss on restore, ignored on save |

pub mod keys;
pub mod store;

pub use keys::{CacheKey, CacheKeySet};
pub use store::{format_bytes, CacheEntry, CacheStore, LocalCacheStore};
