//! Configuration error types.

/// Configuration error with source location.
///
/// Raised while loading layered configuration or when a provider section
/// fails validation (no credentials, zero window capacity, ...).
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Configuration Error: {}{} at line {} in {}", scope(provider), message, line, file)]
pub struct ConfigError {
    /// Error message
    pub message: String,
    /// Provider section the error refers to, if any
    pub provider: Option<String>,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

fn scope(provider: &Option<String>) -> String {
    provider
        .as_deref()
        .map(|p| format!("[{}] ", p))
        .unwrap_or_default()
}

impl ConfigError {
    /// Create a new ConfigError with the given message at the current location.
    ///
    /// # Examples
    ///
    /// ```
    /// use scrivener_error::ConfigError;
    ///
    /// let err = ConfigError::new("Missing required field");
    /// assert!(err.message.contains("Missing required"));
    /// ```
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            provider: None,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Create a ConfigError scoped to one provider section.
    ///
    /// ```
    /// use scrivener_error::ConfigError;
    ///
    /// let err = ConfigError::for_provider("gemini", "max_per_window must be positive");
    /// assert!(format!("{}", err).contains("[gemini]"));
    /// ```
    #[track_caller]
    pub fn for_provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        let mut err = Self::new(message);
        err.provider = Some(provider.into());
        err
    }
}
