//! Provider facades for the Scrivener orchestration layer.
//!
//! A [`Provider`] ties together everything needed to call one rate-limited,
//! multi-key inference endpoint safely:
//!
//! - a [`ResultCache`](scrivener_cache::ResultCache) answering repeated work
//! - a FIFO [`RequestQueue`] with a single worker, so at most one call is in
//!   flight per provider
//! - the [`RateLimiter`](scrivener_rate_limit::RateLimiter),
//!   [`KeyPool`](scrivener_rate_limit::KeyPool) and
//!   [`RetryExecutor`](scrivener_rate_limit::RetryExecutor) the worker drives
//!
//! [`ProviderRegistry`] builds one provider per configured section.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod provider;
mod queue;
mod registry;

pub use provider::{Provider, ProviderStats};
pub use queue::{Operation, QueueState, QueueStats, RequestQueue, operation};
pub use registry::ProviderRegistry;
