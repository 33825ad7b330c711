//! Content-addressed result caching with TTL, LRU and group invalidation.
//!
//! This crate keeps inference results keyed by a [`Fingerprint`] of the
//! document, prompt and operation kind, so that work already analyzed is
//! never sent to a provider twice while the entry is fresh.

#![warn(missing_docs)]

mod cache;
mod fingerprint;

pub use cache::{CacheConfig, CacheConfigBuilder, CacheStats, ResultCache};
pub use fingerprint::{Fingerprint, PROMPT_PREFIX_CHARS};
