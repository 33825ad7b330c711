//! Error types for Scrivener.
//!
//! # Error Hierarchy
//!
//! Errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - Constructors use `#[track_caller]` for automatic location capture
//!
//! [`InferenceError`] is the odd one out: it is produced by caller-supplied
//! inference operations and carries the status code, provider code and retry
//! hint the retry engine classifies on.
//!
//! # Examples
//!
//! ```
//! use scrivener_error::{InferenceError, ScrivenerResult};
//!
//! fn call_model() -> ScrivenerResult<String> {
//!     Err(InferenceError::http(401, "invalid api key"))?
//! }
//!
//! assert!(call_model().is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod inference;
mod provider;

pub use config::ConfigError;
pub use error::{ScrivenerError, ScrivenerErrorKind, ScrivenerResult};
pub use inference::InferenceError;
pub use provider::{ProviderError, ProviderErrorKind};
