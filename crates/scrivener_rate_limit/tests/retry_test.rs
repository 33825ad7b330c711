//! Tests for the failure-class-aware retry engine.

use scrivener_error::InferenceError;
use scrivener_rate_limit::{ErrorClassifier, KeyPool, RetryExecutor, RetryPolicy};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::Instant;

fn pool(n: usize) -> KeyPool {
    let keys = (1..=n).map(|i| format!("key-{}", i)).collect();
    KeyPool::new("test", keys, Duration::from_secs(60)).unwrap()
}

fn executor(max_attempts: u32) -> RetryExecutor {
    RetryExecutor::new("test", RetryPolicy::new(max_attempts), ErrorClassifier::default())
}

#[tokio::test(start_paused = true)]
async fn test_success_on_first_attempt() {
    let keys = pool(2);
    let calls = AtomicU32::new(0);

    let result = executor(3)
        .run(&keys, |key| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, InferenceError>(format!("done with {}", key.expose())) }
        })
        .await
        .unwrap();

    assert_eq!(result, "done with key-1");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_rotates_to_next_key() {
    let keys = pool(3);
    let used = Arc::new(Mutex::new(Vec::new()));

    let result = executor(5)
        .run(&keys, |key| {
            used.lock().unwrap().push(key.expose().to_string());
            async move {
                if key.index() == 0 {
                    Err(InferenceError::http(429, "Too many requests"))
                } else {
                    Ok(format!("ok via {}", key.expose()))
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(result, "ok via key-2");
    assert_eq!(*used.lock().unwrap(), vec!["key-1", "key-2"]);

    let stats = keys.stats();
    assert_eq!(stats.disabled, 1);
    assert_eq!(stats.error_total, 1);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_retry_uses_fixed_short_delay() {
    let keys = pool(2);
    let times = Arc::new(Mutex::new(Vec::new()));
    let calls = AtomicU32::new(0);

    executor(3)
        .run(&keys, |_key| {
            times.lock().unwrap().push(Instant::now());
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(InferenceError::new("quota").with_code("RESOURCE_EXHAUSTED"))
                } else {
                    Ok(())
                }
            }
        })
        .await
        .unwrap();

    let times = times.lock().unwrap();
    let gap = times[1].duration_since(times[0]);
    assert!(gap >= Duration::from_secs(2) && gap < Duration::from_secs(3), "gap {:?}", gap);
}

#[tokio::test(start_paused = true)]
async fn test_fatal_error_is_not_retried() {
    let keys = pool(2);
    let calls = AtomicU32::new(0);

    let err = executor(5)
        .run(&keys, |_key| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<String, _>(InferenceError::http(401, "invalid api key")) }
        })
        .await
        .unwrap_err();

    assert_eq!(err.status, Some(401));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(keys.stats().disabled, 0);
}

#[tokio::test(start_paused = true)]
async fn test_overload_exhausts_attempts_with_growing_capped_delays() {
    let keys = pool(1);
    let times = Arc::new(Mutex::new(Vec::new()));

    let err = executor(5)
        .run(&keys, |_key| {
            times.lock().unwrap().push(Instant::now());
            async { Err::<String, _>(InferenceError::http(503, "Service unavailable")) }
        })
        .await
        .unwrap_err();

    assert_eq!(err.status, Some(503));
    assert!(err.message.contains("Service unavailable"));

    let times = times.lock().unwrap();
    assert_eq!(times.len(), 5);

    let gaps: Vec<Duration> = times.windows(2).map(|w| w[1].duration_since(w[0])).collect();
    assert!(gaps[0] >= Duration::from_secs(30));
    for pair in gaps.windows(2) {
        assert!(pair[1] >= pair[0], "delays must not decrease: {:?}", gaps);
    }
    for gap in &gaps {
        assert!(*gap <= Duration::from_secs(300) + Duration::from_millis(5), "gap {:?}", gap);
    }
}

#[tokio::test(start_paused = true)]
async fn test_rate_limits_do_not_advance_overload_backoff() {
    let keys = pool(3);
    let times = Arc::new(Mutex::new(Vec::new()));
    let calls = AtomicU32::new(0);
    let policy = RetryPolicy::new(5).with_jitter(false);

    executor_with(policy)
        .run(&keys, |_key| {
            times.lock().unwrap().push(Instant::now());
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                match n {
                    0 => Err(InferenceError::http(429, "quota")),
                    1 => Err(InferenceError::http(429, "quota")),
                    2 => Err(InferenceError::http(503, "busy")),
                    _ => Ok(()),
                }
            }
        })
        .await
        .unwrap();

    let times = times.lock().unwrap();
    let overload_gap = times[3].duration_since(times[2]);
    // First overload retry uses the base delay even after two quota retries.
    assert!(
        overload_gap >= Duration::from_secs(30) && overload_gap < Duration::from_secs(31),
        "gap {:?}",
        overload_gap
    );
}

fn executor_with(policy: RetryPolicy) -> RetryExecutor {
    RetryExecutor::new("test", policy, ErrorClassifier::default())
}

#[test]
fn test_overload_delay_schedule_without_jitter() {
    let policy = RetryPolicy::new(10).with_jitter(false);
    let secs: Vec<u64> = (0..6).map(|n| policy.overload_delay(n, None).as_secs()).collect();
    assert_eq!(secs, vec![30, 60, 120, 240, 300, 300]);
}

#[test]
fn test_overload_delay_jitter_is_bounded() {
    let policy = RetryPolicy::new(10);
    let delays: Vec<Duration> = (0..500).map(|_| policy.overload_delay(0, None)).collect();
    for delay in &delays {
        assert!(*delay >= Duration::from_secs(30));
        assert!(*delay <= Duration::from_millis(37_500));
    }
    // Jitter spans the whole 0-25% range, not only its upper part.
    let min = delays.iter().min().copied().unwrap();
    assert!(min < Duration::from_millis(33_750), "smallest delay {:?}", min);
    assert_eq!(policy.overload_delay(4, None), Duration::from_secs(300));
}

#[test]
fn test_suggested_delay_grows_by_one_and_a_half() {
    let policy = RetryPolicy::new(10).with_jitter(false);
    let hint = Some(Duration::from_secs(10));
    assert_eq!(policy.overload_delay(0, hint), Duration::from_secs(10));
    assert_eq!(policy.overload_delay(1, hint), Duration::from_secs(15));
    assert_eq!(policy.overload_delay(2, hint), Duration::from_millis(22_500));
    assert_eq!(policy.overload_delay(20, hint), Duration::from_secs(300));
}

#[tokio::test(start_paused = true)]
async fn test_suggested_delay_from_message_is_honored() {
    let keys = pool(1);
    let times = Arc::new(Mutex::new(Vec::new()));
    let calls = AtomicU32::new(0);

    executor(3)
        .run(&keys, |_key| {
            times.lock().unwrap().push(Instant::now());
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(InferenceError::from_message(
                        r#"code 503; {"status": "UNAVAILABLE", "retryDelay": "7s"}"#,
                    ))
                } else {
                    Ok(())
                }
            }
        })
        .await
        .unwrap();

    let times = times.lock().unwrap();
    let gap = times[1].duration_since(times[0]);
    assert!(gap >= Duration::from_secs(7) && gap < Duration::from_secs(8), "gap {:?}", gap);
}
