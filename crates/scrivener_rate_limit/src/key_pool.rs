//! Credential rotation with per-key quota cool-down.
//!
//! The pool hands out credentials round-robin and takes a key out of rotation
//! for `disable_duration` once it reports a quota failure. Expiry is lazy: the
//! `disabled_until` timestamp is compared on every `select()`, no timers are
//! scheduled. When every key is cooling down the pool fails open and returns
//! the key that has been disabled longest.

use crate::ErrorClass;
use scrivener_error::{ConfigError, ProviderError, ProviderErrorKind, ScrivenerResult};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// A credential selected for one attempt.
///
/// Cheap to clone; the secret itself is shared and redacted from `Debug`.
#[derive(Clone)]
pub struct ApiKey {
    index: usize,
    secret: Arc<SecretString>,
}

impl ApiKey {
    /// Position of this key in its pool.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The raw credential, for building the outbound request.
    pub fn expose(&self) -> &str {
        self.secret.expose_secret()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey(#{})", self.index)
    }
}

#[derive(Debug)]
struct Credential {
    secret: Arc<SecretString>,
    usage_count: u64,
    error_count: u64,
    disabled_until: Option<Instant>,
}

impl Credential {
    fn is_disabled(&self, now: Instant) -> bool {
        self.disabled_until.is_some_and(|until| until > now)
    }
}

#[derive(Debug)]
struct PoolState {
    credentials: Vec<Credential>,
    // Index of the last selected credential.
    cursor: usize,
}

/// Snapshot of a pool's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyPoolStats {
    /// Number of credentials in the pool
    pub total: usize,
    /// Credentials currently selectable
    pub active: usize,
    /// Credentials cooling down after a quota failure
    pub disabled: usize,
    /// Selections across all credentials
    pub usage_total: u64,
    /// Reported failures across all credentials
    pub error_total: u64,
}

/// Round-robin credential pool for one provider.
///
/// # Example
///
/// ```
/// use scrivener_rate_limit::{ErrorClass, KeyPool};
/// use std::time::Duration;
///
/// let pool = KeyPool::new("gemini", vec!["k1".into(), "k2".into()], Duration::from_secs(60)).unwrap();
///
/// let first = pool.select();
/// assert_eq!(first.expose(), "k1");
///
/// pool.report_failure(&first, ErrorClass::RateLimit);
/// assert_eq!(pool.select().expose(), "k2");
/// assert_eq!(pool.select().expose(), "k2");
/// ```
#[derive(Debug)]
pub struct KeyPool {
    provider: String,
    state: Mutex<PoolState>,
    disable_duration: Duration,
}

impl KeyPool {
    /// Create a pool from raw credential strings.
    ///
    /// # Errors
    ///
    /// Returns an error if `keys` is empty.
    pub fn new(
        provider: impl Into<String>,
        keys: Vec<String>,
        disable_duration: Duration,
    ) -> ScrivenerResult<Self> {
        let provider = provider.into();
        if keys.is_empty() {
            return Err(ProviderError::new(ProviderErrorKind::NoCredentials(provider)).into());
        }
        if disable_duration.is_zero() {
            return Err(ConfigError::for_provider(provider, "disable_duration must be positive").into());
        }

        let credentials: Vec<Credential> = keys
            .into_iter()
            .map(|key| Credential {
                secret: Arc::new(SecretString::from(key)),
                usage_count: 0,
                error_count: 0,
                disabled_until: None,
            })
            .collect();
        let cursor = credentials.len() - 1;

        debug!(provider = %provider, keys = credentials.len(), "Created key pool");
        Ok(Self {
            provider,
            state: Mutex::new(PoolState { credentials, cursor }),
            disable_duration,
        })
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of credentials in the pool.
    pub fn len(&self) -> usize {
        self.lock().credentials.len()
    }

    /// Always false; construction rejects empty pools.
    pub fn is_empty(&self) -> bool {
        self.lock().credentials.is_empty()
    }

    /// Select the next credential.
    ///
    /// Advances the cursor past disabled credentials. Never blocks and never
    /// fails: if all credentials are disabled, the one whose cool-down ends
    /// first is re-enabled and returned.
    pub fn select(&self) -> ApiKey {
        let now = Instant::now();
        let mut state = self.lock();
        let len = state.credentials.len();
        let start = (state.cursor + 1) % len;

        let available = (0..len)
            .map(|offset| (start + offset) % len)
            .find(|&idx| !state.credentials[idx].is_disabled(now));

        let index = match available {
            Some(idx) => idx,
            None => {
                let idx = (0..len)
                    .min_by_key(|&idx| state.credentials[idx].disabled_until)
                    .unwrap_or(start);
                warn!(
                    provider = %self.provider,
                    key = idx,
                    "All credentials cooling down, reactivating the longest disabled"
                );
                state.credentials[idx].disabled_until = None;
                idx
            }
        };

        state.cursor = index;
        let credential = &mut state.credentials[index];
        credential.usage_count += 1;
        debug!(provider = %self.provider, key = index, uses = credential.usage_count, "Selected credential");

        ApiKey {
            index,
            secret: Arc::clone(&credential.secret),
        }
    }

    /// Record a failed attempt made with `key`.
    ///
    /// Only [`ErrorClass::RateLimit`] takes the key out of rotation; every
    /// class counts toward the key's error total.
    pub fn report_failure(&self, key: &ApiKey, class: ErrorClass) {
        let now = Instant::now();
        let mut state = self.lock();
        let Some(credential) = state.credentials.get_mut(key.index) else {
            return;
        };

        credential.error_count += 1;
        if class == ErrorClass::RateLimit {
            credential.disabled_until = Some(now + self.disable_duration);
            warn!(
                provider = %self.provider,
                key = key.index,
                cooldown_secs = self.disable_duration.as_secs(),
                "Credential exhausted its quota, disabling"
            );
        } else {
            debug!(provider = %self.provider, key = key.index, %class, "Recorded credential failure");
        }
    }

    /// Current counters.
    pub fn stats(&self) -> KeyPoolStats {
        let now = Instant::now();
        let state = self.lock();
        let disabled = state
            .credentials
            .iter()
            .filter(|c| c.is_disabled(now))
            .count();

        KeyPoolStats {
            total: state.credentials.len(),
            active: state.credentials.len() - disabled,
            disabled,
            usage_total: state.credentials.iter().map(|c| c.usage_count).sum(),
            error_total: state.credentials.iter().map(|c| c.error_count).sum(),
        }
    }
}
