//! Table-driven classification of upstream inference failures.

use scrivener_error::InferenceError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How the retry engine treats a failure.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorClass {
    /// Quota exhausted for the credential used; rotate keys and retry soon.
    RateLimit,
    /// Provider is overloaded; back off exponentially and retry.
    Overload,
    /// Anything else; surfaced on first occurrence.
    Fatal,
}

/// Classification table as it appears in configuration.
///
/// ```toml
/// [providers.gemini.classification]
/// rate_limit_statuses = [429]
/// overload_statuses = [503]
/// rate_limit_codes = ["RESOURCE_EXHAUSTED"]
/// overload_codes = ["UNAVAILABLE"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClassificationConfig {
    /// HTTP statuses that signal quota exhaustion
    #[serde(default = "default_rate_limit_statuses")]
    pub rate_limit_statuses: Vec<u16>,

    /// HTTP statuses that signal provider overload
    #[serde(default = "default_overload_statuses")]
    pub overload_statuses: Vec<u16>,

    /// Provider error codes that signal quota exhaustion
    #[serde(default = "default_rate_limit_codes")]
    pub rate_limit_codes: Vec<String>,

    /// Provider error codes that signal provider overload
    #[serde(default = "default_overload_codes")]
    pub overload_codes: Vec<String>,
}

fn default_rate_limit_statuses() -> Vec<u16> {
    vec![429]
}

fn default_overload_statuses() -> Vec<u16> {
    vec![503, 529]
}

fn default_rate_limit_codes() -> Vec<String> {
    vec!["RESOURCE_EXHAUSTED".to_string(), "rate_limit_error".to_string()]
}

fn default_overload_codes() -> Vec<String> {
    vec!["UNAVAILABLE".to_string(), "overloaded_error".to_string()]
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            rate_limit_statuses: default_rate_limit_statuses(),
            overload_statuses: default_overload_statuses(),
            rate_limit_codes: default_rate_limit_codes(),
            overload_codes: default_overload_codes(),
        }
    }
}

/// Maps status codes and provider codes to an [`ErrorClass`].
///
/// Provider codes are consulted first since they are more specific than the
/// HTTP status; an error matching neither table is [`ErrorClass::Fatal`].
///
/// # Example
///
/// ```
/// use scrivener_error::InferenceError;
/// use scrivener_rate_limit::{ErrorClass, ErrorClassifier};
///
/// let classifier = ErrorClassifier::empty()
///     .with_status(429, ErrorClass::RateLimit)
///     .with_code("UNAVAILABLE", ErrorClass::Overload);
///
/// assert_eq!(classifier.classify(&InferenceError::http(429, "slow down")), ErrorClass::RateLimit);
/// assert_eq!(
///     classifier.classify(&InferenceError::http(500, "x").with_code("UNAVAILABLE")),
///     ErrorClass::Overload
/// );
/// assert_eq!(classifier.classify(&InferenceError::http(400, "bad")), ErrorClass::Fatal);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorClassifier {
    statuses: HashMap<u16, ErrorClass>,
    codes: HashMap<String, ErrorClass>,
}

impl ErrorClassifier {
    /// A classifier that treats every failure as fatal.
    pub fn empty() -> Self {
        Self {
            statuses: HashMap::new(),
            codes: HashMap::new(),
        }
    }

    /// Map an HTTP status to a class.
    pub fn with_status(mut self, status: u16, class: ErrorClass) -> Self {
        self.statuses.insert(status, class);
        self
    }

    /// Map a provider error code to a class.
    pub fn with_code(mut self, code: impl Into<String>, class: ErrorClass) -> Self {
        self.codes.insert(code.into(), class);
        self
    }

    /// Classify a failure.
    pub fn classify(&self, err: &InferenceError) -> ErrorClass {
        err.code
            .as_deref()
            .and_then(|code| self.codes.get(code))
            .or_else(|| err.status.and_then(|status| self.statuses.get(&status)))
            .copied()
            .unwrap_or(ErrorClass::Fatal)
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::from(&ClassificationConfig::default())
    }
}

impl From<&ClassificationConfig> for ErrorClassifier {
    fn from(config: &ClassificationConfig) -> Self {
        let statuses = config
            .rate_limit_statuses
            .iter()
            .map(|s| (*s, ErrorClass::RateLimit))
            .chain(config.overload_statuses.iter().map(|s| (*s, ErrorClass::Overload)))
            .collect();
        let codes = config
            .rate_limit_codes
            .iter()
            .map(|c| (c.clone(), ErrorClass::RateLimit))
            .chain(
                config
                    .overload_codes
                    .iter()
                    .map(|c| (c.clone(), ErrorClass::Overload)),
            )
            .collect();
        Self { statuses, codes }
    }
}
