//! Tests for queue ordering and dispatch pacing.

use futures::future::join_all;
use scrivener_cache::{CacheConfig, Fingerprint};
use scrivener_error::InferenceError;
use scrivener_provider::{Provider, QueueState, operation};
use scrivener_rate_limit::ProviderConfig;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

fn provider(max_per_window: u32, min_interval_ms: u64) -> Provider {
    let config = ProviderConfig {
        keys: vec!["k1".to_string()],
        window_ms: 60_000,
        max_per_window,
        min_interval_ms,
        jitter: false,
        ..Default::default()
    };
    Provider::new("test", &config, &CacheConfig::default()).unwrap()
}

/// Operation that records when it started.
fn recording(log: &Arc<Mutex<Vec<Instant>>>) -> scrivener_provider::Operation {
    let log = Arc::clone(log);
    operation(move |_key| {
        let log = Arc::clone(&log);
        async move {
            log.lock().unwrap().push(Instant::now());
            Ok::<_, InferenceError>("ok".to_string())
        }
    })
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_order_matches_enqueue_order() {
    let provider = provider(100, 0);
    let order = Arc::new(Mutex::new(Vec::new()));
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_in_flight = Arc::new(AtomicUsize::new(0));

    let calls = (0..5).map(|i| {
        let order = Arc::clone(&order);
        let in_flight = Arc::clone(&in_flight);
        let max_in_flight = Arc::clone(&max_in_flight);
        let op = operation(move |_key| {
            let order = Arc::clone(&order);
            let in_flight = Arc::clone(&in_flight);
            let max_in_flight = Arc::clone(&max_in_flight);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_in_flight.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                order.lock().unwrap().push(i);
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, InferenceError>(format!("result {}", i))
            }
        });
        let provider = &provider;
        async move {
            provider
                .invoke(&Fingerprint::from(format!("doc-{}", i)), op, None)
                .await
        }
    });

    let results = join_all(calls).await;

    for (i, result) in results.into_iter().enumerate() {
        assert_eq!(result.unwrap(), format!("result {}", i));
    }
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(provider.queue().state(), QueueState::Idle);
    assert_eq!(provider.queue().pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_queue_respects_window_cap() {
    let provider = provider(2, 0);
    let log = Arc::new(Mutex::new(Vec::new()));
    let op = recording(&log);

    let fps: Vec<Fingerprint> = (0..3).map(|i| Fingerprint::from(format!("doc-{}", i))).collect();
    join_all(fps.iter().map(|fp| provider.invoke(fp, Arc::clone(&op), None))).await;

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 3);
    assert!(log[1] - log[0] < Duration::from_secs(1));
    assert!(log[2] - log[0] >= Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_queue_respects_min_spacing() {
    let provider = provider(100, 5_000);
    let log = Arc::new(Mutex::new(Vec::new()));
    let op = recording(&log);

    let fps: Vec<Fingerprint> = (0..3).map(|i| Fingerprint::from(format!("doc-{}", i))).collect();
    join_all(fps.iter().map(|fp| provider.invoke(fp, Arc::clone(&op), None))).await;

    let log = log.lock().unwrap();
    for pair in log.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_secs(5));
    }
}

#[tokio::test(start_paused = true)]
async fn test_head_of_line_blocking() {
    let provider = provider(100, 0);
    let slow = operation(|_key| async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok::<_, InferenceError>("slow".to_string())
    });
    let fast = operation(|_key| async move { Ok::<_, InferenceError>("fast".to_string()) });

    let start = Instant::now();
    let slow_fp = Fingerprint::from("slow");
    let fast_fp = Fingerprint::from("fast");
    let fast_finished = async {
        provider.invoke(&fast_fp, fast, None).await.unwrap();
        start.elapsed()
    };
    let (_, fast_elapsed) =
        tokio::join!(provider.invoke(&slow_fp, slow, None), fast_finished);

    assert!(fast_elapsed >= Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_worker_restarts_after_idle() {
    let provider = provider(100, 0);
    let op = operation(|_key| async move { Ok::<_, InferenceError>("v".to_string()) });

    provider
        .invoke(&Fingerprint::from("one"), Arc::clone(&op), None)
        .await
        .unwrap();
    assert_eq!(provider.queue().state(), QueueState::Idle);

    provider
        .invoke(&Fingerprint::from("two"), op, None)
        .await
        .unwrap();
    assert_eq!(provider.stats().queue.dispatched, 2);
}
