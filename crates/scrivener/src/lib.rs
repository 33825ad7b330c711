//! Scrivener - AI request orchestration
//!
//! Scrivener sits between document-processing code and rate-limited,
//! multi-key AI inference endpoints. Per provider it keeps a request queue,
//! a sliding-window rate limiter, a rotating credential pool with per-key
//! cool-down, a failure-class-aware retry engine and a content-addressed
//! result cache.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use scrivener::{Fingerprint, InferenceError, ProviderRegistry, ScrivenerConfig, operation};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ScrivenerConfig::load()?;
//!     let registry = ProviderRegistry::from_config(&config)?;
//!     let gemini = registry.get("gemini")?;
//!
//!     let pdf = std::fs::read("invoice.pdf")?;
//!     let prompt = "Extract the invoice total as JSON";
//!     let fp = Fingerprint::derive(&pdf, prompt, "invoice");
//!
//!     let op = operation(move |key| async move {
//!         // call your inference client with key.expose()
//!         Ok::<_, InferenceError>("{\"total\": 42}".to_string())
//!     });
//!     let json = gemini.invoke(&fp, op, Some("batch-7")).await?;
//!     println!("{json}");
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! Scrivener is organized as a workspace with focused crates:
//!
//! - `scrivener-error` - Error types
//! - `scrivener-cache` - Result cache and fingerprints
//! - `scrivener-rate-limit` - Key pool, rate window, retry and configuration
//! - `scrivener-provider` - Request queue, provider facade and registry
//!
//! This crate (`scrivener`) re-exports everything for convenience.

pub use scrivener_cache::*;
pub use scrivener_error::*;
pub use scrivener_provider::*;
pub use scrivener_rate_limit::*;

pub mod observability;
pub use observability::{ObservabilityConfig, init_observability, init_observability_with_config};
