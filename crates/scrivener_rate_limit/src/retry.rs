//! Failure-class-aware retry engine.

use crate::{ApiKey, ErrorClass, ErrorClassifier, KeyPool};
use scrivener_error::InferenceError;
use std::future::Future;
use std::time::Duration;
use tokio_retry2::strategy::jitter_range;
use tracing::{debug, instrument, warn};

/// Delays and bounds applied by [`RetryExecutor`].
#[derive(Debug, Clone, PartialEq, derive_getters::Getters)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    max_attempts: u32,
    /// Fixed delay before retrying a quota failure with another key
    rate_limit_delay: Duration,
    /// First overload backoff; doubles with each overload retry
    overload_base_delay: Duration,
    /// Upper bound on any overload backoff
    overload_max_delay: Duration,
    /// Add up to 25% random jitter to the exponential backoff
    jitter: bool,
}

impl RetryPolicy {
    /// Create a policy with the default delays (2s / 30s / 300s).
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            rate_limit_delay: Duration::from_secs(2),
            overload_base_delay: Duration::from_secs(30),
            overload_max_delay: Duration::from_secs(300),
            jitter: true,
        }
    }

    /// Set the quota-failure retry delay.
    pub fn with_rate_limit_delay(mut self, delay: Duration) -> Self {
        self.rate_limit_delay = delay;
        self
    }

    /// Set the overload backoff base and cap.
    pub fn with_overload_delays(mut self, base: Duration, max: Duration) -> Self {
        self.overload_base_delay = base;
        self.overload_max_delay = max;
        self
    }

    /// Enable or disable backoff jitter.
    pub fn with_jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Backoff before overload retry number `retry` (starting at zero).
    ///
    /// A provider-suggested delay wins over the generic schedule and grows by
    /// 1.5x per retry; otherwise `base * 2^retry` plus jitter. Both are capped
    /// at `overload_max_delay`.
    pub fn overload_delay(&self, retry: u32, suggested: Option<Duration>) -> Duration {
        let max_secs = self.overload_max_delay.as_secs_f64();
        if let Some(suggested) = suggested {
            let secs = suggested.as_secs_f64() * 1.5f64.powi(retry as i32);
            return Duration::from_secs_f64(secs.min(max_secs));
        }

        let backoff = self
            .overload_base_delay
            .saturating_mul(2u32.saturating_pow(retry));
        let backoff = if self.jitter {
            backoff.saturating_add(jitter_range(0.0, 0.25)(backoff))
        } else {
            backoff
        };
        backoff.min(self.overload_max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Runs an operation against a [`KeyPool`], retrying recoverable failures.
///
/// - [`ErrorClass::RateLimit`]: the key is reported to the pool (which disables
///   it) and the operation is retried after a short fixed delay with a freshly
///   selected key. Does not advance the overload backoff.
/// - [`ErrorClass::Overload`]: retried after an exponential backoff.
/// - [`ErrorClass::Fatal`]: returned immediately.
///
/// Once `max_attempts` is reached the last error is returned unchanged. Each
/// retry re-invokes the whole operation, which must be safe to repeat.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    provider: String,
    policy: RetryPolicy,
    classifier: ErrorClassifier,
}

impl RetryExecutor {
    /// Create an executor.
    pub fn new(provider: impl Into<String>, policy: RetryPolicy, classifier: ErrorClassifier) -> Self {
        Self {
            provider: provider.into(),
            policy,
            classifier,
        }
    }

    /// The retry policy in use.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Classify a failure with this executor's table.
    pub fn classify(&self, err: &InferenceError) -> ErrorClass {
        self.classifier.classify(err)
    }

    /// Execute `operation`, selecting a key from `keys` for every attempt.
    #[instrument(skip_all, fields(provider = %self.provider))]
    pub async fn run<T, F, Fut>(&self, keys: &KeyPool, operation: F) -> Result<T, InferenceError>
    where
        F: Fn(ApiKey) -> Fut,
        Fut: Future<Output = Result<T, InferenceError>>,
    {
        let mut attempt = 0u32;
        let mut overload_retries = 0u32;

        loop {
            attempt += 1;
            let key = keys.select();
            debug!(attempt, key = key.index(), "Dispatching attempt");

            let err = match operation(key.clone()).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let class = self.classifier.classify(&err);
            keys.report_failure(&key, class);

            let delay = match class {
                ErrorClass::Fatal => {
                    warn!(attempt, error = %err, "Permanent error, failing immediately");
                    return Err(err);
                }
                _ if attempt >= self.policy.max_attempts => {
                    warn!(attempt, %class, error = %err, "Retries exhausted");
                    return Err(err);
                }
                ErrorClass::RateLimit => self.policy.rate_limit_delay,
                ErrorClass::Overload => {
                    let delay = self.policy.overload_delay(overload_retries, err.suggested_delay);
                    overload_retries += 1;
                    delay
                }
            };

            warn!(
                attempt,
                %class,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Transient error, will retry"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
