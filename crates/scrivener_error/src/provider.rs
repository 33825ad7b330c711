//! Errors raised by provider facades and their request queues.

/// Provider-level error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum ProviderErrorKind {
    /// No provider registered under this name
    #[display("Unknown provider: {}", _0)]
    UnknownProvider(String),
    /// Provider was configured without any credentials
    #[display("Provider '{}' has no credentials configured", _0)]
    NoCredentials(String),
    /// The queue worker stopped before settling the ticket
    #[display("Request queue for '{}' dropped the ticket before it settled", _0)]
    TicketDropped(String),
}

/// Provider error with source location tracking.
///
/// # Examples
///
/// ```
/// use scrivener_error::{ProviderError, ProviderErrorKind};
///
/// let err = ProviderError::new(ProviderErrorKind::UnknownProvider("mistral".into()));
/// assert!(format!("{}", err).contains("mistral"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Provider Error: {} at line {} in {}", kind, line, file)]
pub struct ProviderError {
    kind: ProviderErrorKind,
    line: u32,
    file: &'static str,
}

impl ProviderError {
    /// Create a new provider error with caller location tracking.
    #[track_caller]
    pub fn new(kind: ProviderErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &ProviderErrorKind {
        &self.kind
    }
}
