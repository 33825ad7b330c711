//! Result cache implementation.

use crate::Fingerprint;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    created_at: Instant,
    ttl: Duration,
    group: Option<String>,
    access_tick: u64,
}

impl CacheEntry {
    fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= self.ttl
    }

    fn time_remaining(&self, now: Instant) -> Duration {
        self.ttl
            .saturating_sub(now.saturating_duration_since(self.created_at))
    }
}

/// Configuration for the result cache.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Getters,
    derive_setters::Setters,
    derive_builder::Builder,
)]
#[setters(prefix = "with_")]
#[builder(default)]
pub struct CacheConfig {
    /// Whether caching is enabled
    #[serde(default = "default_enabled")]
    enabled: bool,

    /// Maximum cache size (number of entries)
    #[serde(default = "default_max_size")]
    max_size: usize,

    /// Default TTL for cached entries (seconds)
    #[serde(default = "default_ttl_secs")]
    ttl_secs: u64,

    /// How often the background sweeper drops expired entries (seconds)
    #[serde(default = "default_sweep_interval_secs")]
    sweep_interval_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_max_size() -> usize {
    100
}

fn default_ttl_secs() -> u64 {
    3_600 // 1 hour
}

fn default_sweep_interval_secs() -> u64 {
    300 // 5 minutes
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_size: default_max_size(),
            ttl_secs: default_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl CacheConfig {
    /// Default entry TTL.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Background sweep period.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Hit/miss counters and occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    /// Entries currently stored
    pub size: usize,
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that found nothing (or an expired entry)
    pub misses: u64,
    /// `hits / (hits + misses)`, zero before the first lookup
    pub hit_rate: f64,
}

#[derive(Debug, Default)]
struct CacheStore {
    entries: HashMap<Fingerprint, CacheEntry>,
    groups: HashMap<String, HashSet<Fingerprint>>,
    tick: u64,
    hits: u64,
    misses: u64,
}

impl CacheStore {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn remove(&mut self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        let entry = self.entries.remove(fingerprint)?;
        if let Some(group) = entry.group.as_deref() {
            self.unlink(group, fingerprint);
        }
        Some(entry)
    }

    fn unlink(&mut self, group: &str, fingerprint: &Fingerprint) {
        if let Some(members) = self.groups.get_mut(group) {
            members.remove(fingerprint);
            if members.is_empty() {
                self.groups.remove(group);
            }
        }
    }

    fn evict_lru(&mut self) {
        let lru = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.access_tick)
            .map(|(fingerprint, _)| fingerprint.clone());

        if let Some(fingerprint) = lru {
            tracing::debug!(%fingerprint, "Evicting LRU entry");
            self.remove(&fingerprint);
        }
    }
}

/// Content-addressed cache for inference results.
///
/// Two cooperating bounds apply:
/// - a capacity of `max_size` entries; inserting a new fingerprint when full
///   evicts the least recently accessed entry
/// - a TTL per entry; expired entries read as misses and are dropped by
///   [`sweep_expired`](Self::sweep_expired)
///
/// Entries may be tagged with a group (a batch of work) so that
/// [`invalidate_group`](Self::invalidate_group) can drop them together. All
/// methods take `&self` and are safe to call concurrently.
///
/// # Example
///
/// ```
/// use scrivener_cache::{CacheConfig, Fingerprint, ResultCache};
///
/// let cache = ResultCache::new(CacheConfig::default());
/// let fp = Fingerprint::derive(b"scan bytes", "Extract totals", "invoice");
///
/// cache.put(&fp, "{\"total\": 42}".to_string(), Some("batch-7"));
/// assert_eq!(cache.get(&fp).as_deref(), Some("{\"total\": 42}"));
///
/// assert_eq!(cache.invalidate_group("batch-7"), 1);
/// assert!(cache.get(&fp).is_none());
/// ```
#[derive(Debug)]
pub struct ResultCache {
    config: CacheConfig,
    store: Mutex<CacheStore>,
}

impl ResultCache {
    /// Create a new result cache with configuration.
    pub fn new(config: CacheConfig) -> Self {
        tracing::debug!(
            ttl_secs = config.ttl_secs,
            max_size = config.max_size,
            enabled = config.enabled,
            "Creating new ResultCache"
        );
        Self {
            config,
            store: Mutex::new(CacheStore::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The configuration this cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a result, refreshing its recency on a hit.
    ///
    /// Returns None if:
    /// - Entry doesn't exist
    /// - Entry is expired (it is removed)
    /// - Cache is disabled
    #[tracing::instrument(skip_all, fields(%fingerprint))]
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<String> {
        let mut store = self.lock();
        if !self.config.enabled {
            store.misses += 1;
            return None;
        }

        let now = Instant::now();
        let expired = match store.entries.get(fingerprint) {
            None => {
                store.misses += 1;
                tracing::debug!("Cache miss");
                return None;
            }
            Some(entry) => entry.is_expired_at(now),
        };

        if expired {
            tracing::debug!("Cache entry expired, removing");
            store.remove(fingerprint);
            store.misses += 1;
            return None;
        }

        let tick = store.next_tick();
        store.hits += 1;
        let entry = store.entries.get_mut(fingerprint)?;
        entry.access_tick = tick;

        tracing::debug!(time_remaining = ?entry.time_remaining(now), "Cache hit");
        Some(entry.value.clone())
    }

    /// Look up a live result without touching counters or recency.
    pub fn peek(&self, fingerprint: &Fingerprint) -> Option<String> {
        if !self.config.enabled {
            return None;
        }
        let store = self.lock();
        store
            .entries
            .get(fingerprint)
            .filter(|entry| !entry.is_expired_at(Instant::now()))
            .map(|entry| entry.value.clone())
    }

    /// Store a result with the default TTL.
    pub fn put(&self, fingerprint: &Fingerprint, value: String, group: Option<&str>) {
        self.put_with_ttl(fingerprint, value, group, self.config.ttl());
    }

    /// Store a result with an explicit TTL.
    ///
    /// Replacing an existing fingerprint moves it to the new group.
    #[tracing::instrument(skip_all, fields(%fingerprint, ?group, ?ttl))]
    pub fn put_with_ttl(
        &self,
        fingerprint: &Fingerprint,
        value: String,
        group: Option<&str>,
        ttl: Duration,
    ) {
        if !self.config.enabled || self.config.max_size == 0 {
            tracing::debug!("Cache disabled, skipping insert");
            return;
        }

        let mut store = self.lock();
        let replaced = store.remove(fingerprint).is_some();
        if !replaced && store.entries.len() >= self.config.max_size {
            store.evict_lru();
        }

        let now = Instant::now();
        let tick = store.next_tick();
        if let Some(group) = group {
            store
                .groups
                .entry(group.to_string())
                .or_default()
                .insert(fingerprint.clone());
        }
        store.entries.insert(
            fingerprint.clone(),
            CacheEntry {
                value,
                created_at: now,
                ttl,
                group: group.map(str::to_string),
                access_tick: tick,
            },
        );

        tracing::debug!(replaced, size = store.entries.len(), "Inserted entry into cache");
    }

    /// Remove every entry stored under `group`.
    ///
    /// Returns how many entries were removed.
    #[tracing::instrument(skip(self))]
    pub fn invalidate_group(&self, group: &str) -> usize {
        let mut store = self.lock();
        let Some(members) = store.groups.remove(group) else {
            return 0;
        };

        let mut removed = 0;
        for fingerprint in &members {
            let in_group = store
                .entries
                .get(fingerprint)
                .is_some_and(|entry| entry.group.as_deref() == Some(group));
            if in_group {
                store.entries.remove(fingerprint);
                removed += 1;
            }
        }

        tracing::info!(group, removed, "Invalidated cache group");
        removed
    }

    /// Remove expired entries and prune groups left empty.
    pub fn sweep_expired(&self) -> usize {
        let mut store = self.lock();
        let now = Instant::now();

        let expired: Vec<Fingerprint> = store
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(fingerprint, _)| fingerprint.clone())
            .collect();
        for fingerprint in &expired {
            store.remove(fingerprint);
        }
        store.groups.retain(|_, members| !members.is_empty());

        let removed = expired.len();
        if removed > 0 {
            tracing::info!(removed, remaining = store.entries.len(), "Swept expired cache entries");
        }
        removed
    }

    /// Start a background task calling [`sweep_expired`](Self::sweep_expired)
    /// every `sweep_interval`.
    ///
    /// The task holds a weak reference and ends once the cache is dropped.
    /// Returns `None` when the cache is disabled, the interval is zero or no
    /// tokio runtime is running.
    pub fn spawn_sweeper(cache: &Arc<Self>) -> Option<JoinHandle<()>> {
        let period = cache.config.sweep_interval();
        if !cache.config.enabled || period.is_zero() {
            return None;
        }
        let runtime = tokio::runtime::Handle::try_current().ok()?;

        let weak = Arc::downgrade(cache);
        Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let Some(cache) = weak.upgrade() else {
                    tracing::debug!("Result cache dropped, stopping sweeper");
                    break;
                };
                cache.sweep_expired();
            }
        }))
    }

    /// Clear all cache entries.
    pub fn clear(&self) {
        let mut store = self.lock();
        let count = store.entries.len();
        store.entries.clear();
        store.groups.clear();
        tracing::info!(cleared = count, "Cleared cache");
    }

    /// Get number of cached entries.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        let store = self.lock();
        let lookups = store.hits + store.misses;
        CacheStats {
            size: store.entries.len(),
            hits: store.hits,
            misses: store.misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                store.hits as f64 / lookups as f64
            },
        }
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
