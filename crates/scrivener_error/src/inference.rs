//! Upstream inference failures and the hints carried in their messages.

use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

static STATUS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:"code"|\bcode|\bstatus|\bhttp)\s*[:=]?\s*(\d{3})\b"#)
        .expect("status pattern is valid")
});

static PROVIDER_CODE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:"status"|"type")\s*:\s*"([A-Za-z_]+)""#).expect("code pattern is valid")
});

static DELAY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(?:"retryDelay"\s*:\s*"|retry[ -]after[:\s]*|retry in\s*)(\d+(?:\.\d+)?)\s*(ms|s)?"#,
    )
    .expect("delay pattern is valid")
});

/// Failure reported by an inference client operation.
///
/// Upstream errors are not typed, so this carries whatever a client could
/// extract: an HTTP status, a provider-specific error code, and a suggested
/// retry delay. Classification into rate-limit / overload / fatal is done by
/// the retry engine's table, not here.
///
/// # Examples
///
/// ```
/// use scrivener_error::InferenceError;
///
/// let err = InferenceError::http(429, "Too many requests");
/// assert_eq!(err.status, Some(429));
/// assert!(format!("{}", err).contains("Too many requests"));
/// ```
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
#[display("Inference Error: {} at line {} in {}", message, line, file)]
pub struct InferenceError {
    /// HTTP status code, when known
    pub status: Option<u16>,
    /// Provider-specific error code (e.g. `RESOURCE_EXHAUSTED`)
    pub code: Option<String>,
    /// Error message as reported upstream
    pub message: String,
    /// Delay the provider asked us to wait before retrying
    pub suggested_delay: Option<Duration>,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl InferenceError {
    /// Create an error carrying only a message.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            status: None,
            code: None,
            message: message.into(),
            suggested_delay: None,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Create an error for an HTTP status code.
    #[track_caller]
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        let mut err = Self::new(message);
        err.status = Some(status);
        err
    }

    /// Build an error from a free-text upstream message.
    ///
    /// Recognizes status codes written as `code 503`, `HTTP 429`, `status: 429`
    /// or `"code": 429`, provider codes in `"status": "..."` / `"type": "..."`
    /// fields, and retry hints written as `"retryDelay": "30s"`,
    /// `retry after 12s`, `retry in 4.5s` or `retry in 580ms`. A bare number is
    /// read as seconds.
    ///
    /// ```
    /// use scrivener_error::InferenceError;
    /// use std::time::Duration;
    ///
    /// let err = InferenceError::from_message(
    ///     r#"bad response from server; code 429; {"status": "RESOURCE_EXHAUSTED", "retryDelay": "17s"}"#,
    /// );
    /// assert_eq!(err.status, Some(429));
    /// assert_eq!(err.code.as_deref(), Some("RESOURCE_EXHAUSTED"));
    /// assert_eq!(err.suggested_delay, Some(Duration::from_secs(17)));
    /// ```
    #[track_caller]
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let status = parse_status(&message);
        let code = parse_provider_code(&message);
        let suggested_delay = parse_suggested_delay(&message);
        let mut err = Self::new(message);
        err.status = status;
        err.code = code;
        err.suggested_delay = suggested_delay;
        err
    }

    /// Attach a provider-specific error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Attach the provider's suggested retry delay.
    pub fn with_suggested_delay(mut self, delay: Duration) -> Self {
        self.suggested_delay = Some(delay);
        self
    }
}

fn parse_status(message: &str) -> Option<u16> {
    STATUS_PATTERN
        .captures_iter(message)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u16>().ok())
        .find(|status| (100..600).contains(status))
}

fn parse_provider_code(message: &str) -> Option<String> {
    // Envelope objects use "type": "error"; the useful code is nested.
    PROVIDER_CODE_PATTERN
        .captures_iter(message)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .find(|code| !code.eq_ignore_ascii_case("error"))
        .map(str::to_string)
}

fn parse_suggested_delay(message: &str) -> Option<Duration> {
    let caps = DELAY_PATTERN.captures(message)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let millis = match caps.get(2) {
        Some(unit) if unit.as_str().eq_ignore_ascii_case("ms") => value,
        _ => value * 1_000.0,
    };
    Some(Duration::from_micros((millis * 1_000.0).round() as u64))
}
