//! End-to-end tests through the re-exporting facade crate.

use futures::future::join_all;
use scrivener::{
    CacheConfig, Fingerprint, InferenceError, ProviderConfig, ProviderRegistry, ScrivenerConfig,
    operation,
};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::Builder;

#[test]
fn test_bundled_provider_defaults() {
    let config = ScrivenerConfig::load().unwrap();

    let gemini = config.provider("gemini").unwrap();
    assert_eq!(gemini.max_per_window, 12);
    assert_eq!(gemini.window(), Duration::from_secs(60));
    assert_eq!(gemini.min_interval(), Duration::from_secs(5));

    let claude = config.provider("claude").unwrap();
    assert_eq!(claude.max_per_window, 60);
    assert_eq!(claude.min_interval(), Duration::from_secs(1));
}

#[test]
fn test_config_file_round_trips_through_toml() {
    let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
[providers.local]
keys = ["secret-1"]
max_per_window = 3

[cache]
max_size = 5
"#
    )
    .unwrap();

    let config = ScrivenerConfig::from_file(file.path()).unwrap();
    let rendered = toml::to_string_pretty(&config).unwrap();

    assert!(rendered.contains("max_per_window = 3"));
    assert!(rendered.contains("max_size = 5"));
    assert!(!rendered.contains("secret-1"), "credentials must not be printed");
}

#[tokio::test(start_paused = true)]
async fn test_batch_through_registry() {
    let config = ScrivenerConfig {
        providers: HashMap::from([(
            "gemini".to_string(),
            ProviderConfig {
                keys: vec!["key-1".to_string(), "key-2".to_string()],
                jitter: false,
                ..Default::default()
            },
        )]),
        cache: CacheConfig::default(),
    };
    let registry = ProviderRegistry::from_config(&config).unwrap();
    let gemini = registry.get("gemini").unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let op = {
        let calls = Arc::clone(&calls);
        operation(move |key| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, InferenceError>(format!("via key #{}", key.index()))
            }
        })
    };

    // Two distinct documents, one submitted twice.
    let documents: [&[u8]; 3] = [b"page one", b"page two", b"page one"];
    let fps: Vec<Fingerprint> = documents
        .iter()
        .map(|doc| Fingerprint::derive(doc, "Extract totals", "invoice"))
        .collect();

    let results = join_all(
        fps.iter()
            .map(|fp| gemini.invoke(fp, Arc::clone(&op), Some("batch-1"))),
    )
    .await;

    let results: Vec<String> = results.into_iter().map(Result::unwrap).collect();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(results[0], results[2]);
    let stats = gemini.stats();
    assert_eq!(stats.rate_window.in_window, 2);
    assert_eq!(stats.key_pool.usage_total, 2);

    assert_eq!(registry.invalidate_group("batch-1"), 2);
}
