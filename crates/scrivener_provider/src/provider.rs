//! Provider facade: cache in front of a rate-limited, retrying queue.

use crate::queue::{Dispatch, Operation, QueueStats, RequestQueue};
use scrivener_cache::{CacheConfig, CacheStats, Fingerprint, ResultCache};
use scrivener_error::ScrivenerResult;
use scrivener_rate_limit::{
    KeyPool, KeyPoolStats, ProviderConfig, RateLimiter, RateWindowStats, RetryExecutor,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

/// Everything a dashboard needs to know about one provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderStats {
    /// Provider name
    pub provider: String,
    /// Credential rotation counters
    pub key_pool: KeyPoolStats,
    /// Sliding window occupancy
    pub rate_window: RateWindowStats,
    /// Result cache counters
    pub cache: CacheStats,
    /// Queue counters
    pub queue: QueueStats,
}

/// Single entry point for inference against one provider.
///
/// `invoke` answers from the [`ResultCache`] when it can; otherwise the
/// operation joins the provider's FIFO queue, where the worker waits for the
/// rate limiter, runs it through the retry executor with a rotating
/// credential, and caches a success before the caller sees it.
///
/// Build one per provider at startup and share it by reference.
///
/// # Example
///
/// ```no_run
/// use scrivener_cache::{CacheConfig, Fingerprint};
/// use scrivener_error::InferenceError;
/// use scrivener_provider::{Provider, operation};
/// use scrivener_rate_limit::ProviderConfig;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ProviderConfig {
///     keys: vec!["key-1".into(), "key-2".into()],
///     ..Default::default()
/// };
/// let gemini = Provider::new("gemini", &config, &CacheConfig::default())?;
///
/// let fp = Fingerprint::derive(b"scan bytes", "Extract totals", "invoice");
/// let op = operation(|key| async move {
///     // call the inference client with key.expose()
///     Ok::<_, InferenceError>("{\"total\": 42}".to_string())
/// });
///
/// let json = gemini.invoke(&fp, op, Some("batch-7")).await?;
/// # let _ = json;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Provider {
    name: String,
    queue: RequestQueue,
    sweeper: Option<JoinHandle<()>>,
}

impl Provider {
    /// Build a provider from its configuration section.
    ///
    /// Starts the cache sweeper when called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the section is invalid or resolves no credentials.
    pub fn new(
        name: impl Into<String>,
        config: &ProviderConfig,
        cache: &CacheConfig,
    ) -> ScrivenerResult<Self> {
        let name = name.into();
        config.validate(&name)?;

        let keys = KeyPool::new(&name, config.resolved_keys(), config.disable_duration())?;
        let limiter = RateLimiter::new(
            &name,
            config.window(),
            config.max_per_window as usize,
            config.min_interval(),
        )?;
        let retry = RetryExecutor::new(&name, config.retry_policy(), config.classifier());
        let cache = Arc::new(ResultCache::new(cache.clone()));

        info!(
            provider = %name,
            keys = keys.len(),
            max_per_window = config.max_per_window,
            window_ms = config.window_ms,
            min_interval_ms = config.min_interval_ms,
            "Provider ready"
        );
        Ok(Self::from_parts(name, keys, limiter, retry, cache))
    }

    /// Assemble a provider from prebuilt components.
    ///
    /// Starts the cache sweeper when called inside a tokio runtime.
    pub fn from_parts(
        name: impl Into<String>,
        keys: KeyPool,
        limiter: RateLimiter,
        retry: RetryExecutor,
        cache: Arc<ResultCache>,
    ) -> Self {
        let name = name.into();
        let sweeper = ResultCache::spawn_sweeper(&cache);
        let queue = RequestQueue::new(Dispatch {
            provider: name.clone(),
            keys,
            limiter,
            retry,
            cache,
        });
        Self {
            name,
            queue,
            sweeper,
        }
    }

    /// Provider name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The provider's result cache.
    pub fn cache(&self) -> &ResultCache {
        &self.queue.dispatch().cache
    }

    /// The provider's request queue.
    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    /// Return the cached result for `fingerprint`, or run `operation` through
    /// the queue and cache its success under `group`.
    ///
    /// # Errors
    ///
    /// Returns the last inference error once retries are exhausted or a
    /// fatal error occurs. Failures are never cached.
    #[instrument(skip_all, fields(provider = %self.name, %fingerprint, ?group))]
    pub async fn invoke(
        &self,
        fingerprint: &Fingerprint,
        operation: Operation,
        group: Option<&str>,
    ) -> ScrivenerResult<String> {
        if let Some(hit) = self.cache().get(fingerprint) {
            debug!("Served from cache");
            return Ok(hit);
        }

        self.queue
            .enqueue(fingerprint.clone(), group.map(str::to_string), operation)
            .await
    }

    /// Drop every cached result stored under `group`.
    pub fn invalidate_group(&self, group: &str) -> usize {
        self.cache().invalidate_group(group)
    }

    /// Current counters of every component.
    pub fn stats(&self) -> ProviderStats {
        let dispatch = self.queue.dispatch();
        ProviderStats {
            provider: self.name.clone(),
            key_pool: dispatch.keys.stats(),
            rate_window: dispatch.limiter.stats(),
            cache: dispatch.cache.stats(),
            queue: self.queue.stats(),
        }
    }
}

impl Drop for Provider {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}
