//! Top-level error wrapper types.

use crate::{ConfigError, InferenceError, ProviderError};

/// Every failure a Scrivener caller can observe.
///
/// # Examples
///
/// ```
/// use scrivener_error::{InferenceError, ScrivenerError};
///
/// let err: ScrivenerError = InferenceError::http(503, "Service unavailable").into();
/// assert!(format!("{}", err).contains("Service unavailable"));
/// assert_eq!(err.inference().and_then(|e| e.status), Some(503));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum ScrivenerErrorKind {
    /// Final error returned by an inference operation
    #[from(InferenceError)]
    Inference(InferenceError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Provider facade or queue error
    #[from(ProviderError)]
    Provider(ProviderError),
}

/// Scrivener error with kind discrimination.
///
/// # Examples
///
/// ```
/// use scrivener_error::{ConfigError, ScrivenerResult};
///
/// fn might_fail() -> ScrivenerResult<()> {
///     Err(ConfigError::new("Missing field"))?
/// }
///
/// assert!(might_fail().is_err());
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Scrivener Error: {}", _0)]
pub struct ScrivenerError(Box<ScrivenerErrorKind>);

impl ScrivenerError {
    /// Create a new error from a kind.
    pub fn new(kind: ScrivenerErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &ScrivenerErrorKind {
        &self.0
    }

    /// The upstream inference error, when this is one.
    pub fn inference(&self) -> Option<&InferenceError> {
        match self.kind() {
            ScrivenerErrorKind::Inference(err) => Some(err),
            _ => None,
        }
    }
}

impl<T> From<T> for ScrivenerError
where
    T: Into<ScrivenerErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Scrivener operations.
pub type ScrivenerResult<T> = std::result::Result<T, ScrivenerError>;
