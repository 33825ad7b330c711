//! Sliding-window rate limiter with minimum dispatch spacing.
//!
//! Two constraints apply to every dispatch of a provider:
//! - at most `max_per_window` dispatches inside any rolling `window`
//! - consecutive dispatches at least `min_interval` apart
//!
//! The window cap bounds throughput over a minute; the spacing bound smooths
//! bursts inside the window.

use scrivener_error::{ConfigError, ScrivenerResult};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, instrument};

#[derive(Debug)]
struct RateWindow {
    timestamps: VecDeque<Instant>,
    window: Duration,
    max_per_window: usize,
    min_interval: Duration,
    last_dispatch: Option<Instant>,
}

impl RateWindow {
    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.timestamps.front() {
            if oldest + self.window <= now {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// How long the next dispatch must wait, or `None` if it may go now.
    fn wait_time(&mut self, now: Instant) -> Option<Duration> {
        self.prune(now);

        if self.timestamps.len() >= self.max_per_window {
            let oldest = *self.timestamps.front()?;
            return Some((oldest + self.window).saturating_duration_since(now));
        }

        self.last_dispatch
            .map(|last| (last + self.min_interval).saturating_duration_since(now))
            .filter(|wait| !wait.is_zero())
    }

    fn record(&mut self, now: Instant) {
        self.last_dispatch = Some(now);
        self.timestamps.push_back(now);
    }
}

/// Snapshot of a rate window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateWindowStats {
    /// Dispatches inside the current window
    pub in_window: usize,
    /// Window capacity
    pub max_per_window: usize,
    /// Window length in milliseconds
    pub window_ms: u64,
    /// Minimum spacing between dispatches in milliseconds
    pub min_interval_ms: u64,
    /// Milliseconds since the last dispatch, if any
    pub since_last_dispatch_ms: Option<u64>,
}

/// Rate limiter for a single provider instance.
///
/// Waiting suspends the calling task with `tokio::time::sleep`; the internal
/// lock is never held across an await.
///
/// # Example
///
/// ```rust,ignore
/// let limiter = RateLimiter::new("gemini", Duration::from_secs(60), 12, Duration::from_secs(5))?;
/// limiter.acquire().await;
/// // dispatch the request
/// ```
#[derive(Debug)]
pub struct RateLimiter {
    provider: String,
    state: Mutex<RateWindow>,
}

impl RateLimiter {
    /// Create a limiter.
    ///
    /// # Errors
    ///
    /// Returns an error if `window` is zero or `max_per_window` is zero.
    pub fn new(
        provider: impl Into<String>,
        window: Duration,
        max_per_window: usize,
        min_interval: Duration,
    ) -> ScrivenerResult<Self> {
        let provider = provider.into();
        if window.is_zero() {
            return Err(ConfigError::for_provider(provider, "window must be positive").into());
        }
        if max_per_window == 0 {
            return Err(ConfigError::for_provider(provider, "max_per_window must be positive").into());
        }

        Ok(Self {
            provider,
            state: Mutex::new(RateWindow {
                timestamps: VecDeque::with_capacity(max_per_window),
                window,
                max_per_window,
                min_interval,
                last_dispatch: None,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, RateWindow> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait until a dispatch is permitted, then record it.
    ///
    /// Returns the instant the dispatch was recorded at.
    #[instrument(skip(self), fields(provider = %self.provider))]
    pub async fn acquire(&self) -> Instant {
        loop {
            let wait = {
                let mut window = self.lock();
                let now = Instant::now();
                match window.wait_time(now) {
                    Some(wait) => wait,
                    None => {
                        window.record(now);
                        return now;
                    }
                }
            };

            debug!(wait_ms = wait.as_millis() as u64, "Waiting for rate limit slot");
            sleep(wait).await;
        }
    }

    /// Record a dispatch if one is permitted right now.
    pub fn try_acquire(&self) -> Option<Instant> {
        let mut window = self.lock();
        let now = Instant::now();
        if window.wait_time(now).is_some() {
            return None;
        }
        window.record(now);
        Some(now)
    }

    /// Current window occupancy.
    pub fn stats(&self) -> RateWindowStats {
        let mut window = self.lock();
        let now = Instant::now();
        window.prune(now);

        RateWindowStats {
            in_window: window.timestamps.len(),
            max_per_window: window.max_per_window,
            window_ms: window.window.as_millis() as u64,
            min_interval_ms: window.min_interval.as_millis() as u64,
            since_last_dispatch_ms: window
                .last_dispatch
                .map(|last| now.saturating_duration_since(last).as_millis() as u64),
        }
    }
}
