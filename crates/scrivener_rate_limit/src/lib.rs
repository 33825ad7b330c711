//! Rate limiting, credential rotation and retry for AI providers.
//!
//! Each provider instance owns:
//! - a [`KeyPool`] rotating interchangeable credentials, with a quota
//!   cool-down per key
//! - a [`RateLimiter`] enforcing a sliding-window cap and a minimum spacing
//!   between dispatches
//! - a [`RetryExecutor`] that classifies failures through an
//!   [`ErrorClassifier`] table and decides between rotating keys, backing off
//!   or failing
//!
//! Settings for all of these come from [`ScrivenerConfig`].

#![warn(missing_docs)]

mod classify;
mod config;
mod key_pool;
mod retry;
mod window;

pub use classify::{ClassificationConfig, ErrorClass, ErrorClassifier};
pub use config::{ProviderConfig, ScrivenerConfig};
pub use key_pool::{ApiKey, KeyPool, KeyPoolStats};
pub use retry::{RetryExecutor, RetryPolicy};
pub use window::{RateLimiter, RateWindowStats};
