//! Tests for the sliding-window rate limiter.

use scrivener_rate_limit::RateLimiter;
use std::time::Duration;
use tokio::time::Instant;

fn limiter(max_per_window: usize, window_ms: u64, min_interval_ms: u64) -> RateLimiter {
    RateLimiter::new(
        "test",
        Duration::from_millis(window_ms),
        max_per_window,
        Duration::from_millis(min_interval_ms),
    )
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_window_and_spacing_schedule() {
    let limiter = limiter(12, 60_000, 5_000);
    let start = Instant::now();

    let mut offsets = Vec::new();
    for _ in 0..15 {
        let at = limiter.acquire().await;
        offsets.push(at.duration_since(start).as_millis() as u64);
    }

    // Twelve dispatches paced by the spacing bound.
    for (i, &at) in offsets[..12].iter().enumerate() {
        assert_near(at, i as u64 * 5_000);
    }

    // The 13th waits for the t=0 entry to leave the window.
    assert!(offsets[12] >= 60_000, "13th dispatched at {}ms", offsets[12]);
    assert_near(offsets[12], 60_000);
    assert_near(offsets[13], 65_000);
    assert_near(offsets[14], 70_000);
}

/// Paused-clock timers fire on millisecond ticks, never early.
fn assert_near(actual: u64, expected: u64) {
    assert!(
        actual >= expected && actual <= expected + 50,
        "expected dispatch at ~{}ms, got {}ms",
        expected,
        actual
    );
}

#[tokio::test(start_paused = true)]
async fn test_window_bound_holds_for_any_interval() {
    let limiter = limiter(3, 10_000, 0);
    let start = Instant::now();

    let mut offsets = Vec::new();
    for _ in 0..10 {
        let at = limiter.acquire().await;
        offsets.push(at.duration_since(start).as_millis() as u64);
    }

    for (i, &from) in offsets.iter().enumerate() {
        let in_window = offsets[i..].iter().filter(|&&t| t < from + 10_000).count();
        assert!(in_window <= 3, "{} dispatches within 10s of {}ms", in_window, from);
    }
}

#[tokio::test(start_paused = true)]
async fn test_spacing_bound_between_consecutive_dispatches() {
    let limiter = limiter(100, 60_000, 1_000);

    let mut previous = limiter.acquire().await;
    for _ in 0..20 {
        let at = limiter.acquire().await;
        assert!(at.duration_since(previous) >= Duration::from_millis(1_000));
        previous = at;
    }
}

#[tokio::test(start_paused = true)]
async fn test_try_acquire_does_not_wait() {
    let limiter = limiter(2, 60_000, 0);

    assert!(limiter.try_acquire().is_some());
    assert!(limiter.try_acquire().is_some());
    assert!(limiter.try_acquire().is_none(), "third request should be limited");

    tokio::time::advance(Duration::from_secs(60)).await;
    assert!(limiter.try_acquire().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_stats_report_occupancy() {
    let limiter = limiter(5, 60_000, 0);
    limiter.acquire().await;
    limiter.acquire().await;

    let stats = limiter.stats();
    assert_eq!(stats.in_window, 2);
    assert_eq!(stats.max_per_window, 5);
    assert_eq!(stats.window_ms, 60_000);
    assert_eq!(stats.min_interval_ms, 0);
    assert_eq!(stats.since_last_dispatch_ms, Some(0));

    tokio::time::advance(Duration::from_secs(61)).await;
    assert_eq!(limiter.stats().in_window, 0);
}

#[test]
fn test_zero_capacity_is_rejected() {
    assert!(RateLimiter::new("test", Duration::from_secs(60), 0, Duration::ZERO).is_err());
    assert!(RateLimiter::new("test", Duration::ZERO, 5, Duration::ZERO).is_err());
}
