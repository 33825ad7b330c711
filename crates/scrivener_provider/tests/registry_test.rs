//! Tests for building providers from configuration.

use scrivener_cache::CacheConfig;
use scrivener_error::{ProviderErrorKind, ScrivenerErrorKind};
use scrivener_provider::{Provider, ProviderRegistry};
use scrivener_rate_limit::{ProviderConfig, ScrivenerConfig};
use std::collections::HashMap;

fn section(keys: &[&str]) -> ProviderConfig {
    ProviderConfig {
        keys: keys.iter().map(|k| k.to_string()).collect(),
        ..Default::default()
    }
}

fn config() -> ScrivenerConfig {
    ScrivenerConfig {
        providers: HashMap::from([
            ("gemini".to_string(), section(&["g1", "g2"])),
            ("claude".to_string(), section(&[])),
        ]),
        cache: CacheConfig::default(),
    }
}

#[test]
fn test_providers_without_credentials_are_skipped() {
    let registry = ProviderRegistry::from_config(&config()).unwrap();

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.names().collect::<Vec<_>>(), vec!["gemini"]);
    assert_eq!(registry.get("gemini").unwrap().name(), "gemini");
}

#[test]
fn test_unknown_provider() {
    let registry = ProviderRegistry::from_config(&config()).unwrap();

    let err = registry.get("claude").unwrap_err();
    match err.kind() {
        ScrivenerErrorKind::Provider(err) => {
            assert_eq!(err.kind(), &ProviderErrorKind::UnknownProvider("claude".into()));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_invalid_section_fails_the_build() {
    let mut config = config();
    config.providers.insert(
        "broken".to_string(),
        ProviderConfig {
            max_retries: 0,
            ..section(&["b1"])
        },
    );

    assert!(ProviderRegistry::from_config(&config).is_err());
}

#[test]
fn test_stats_cover_every_provider() {
    let mut registry = ProviderRegistry::from_config(&config()).unwrap();
    registry.register(Provider::new("claude", &section(&["c1"]), &CacheConfig::default()).unwrap());

    let stats = registry.stats();
    let names: Vec<&str> = stats.iter().map(|s| s.provider.as_str()).collect();
    assert_eq!(names, vec!["claude", "gemini"]);
    assert_eq!(stats[1].key_pool.total, 2);
}

#[test]
fn test_register_replaces_existing() {
    let mut registry = ProviderRegistry::new();
    assert!(registry.is_empty());

    registry.register(Provider::new("gemini", &section(&["a"]), &CacheConfig::default()).unwrap());
    registry.register(
        Provider::new("gemini", &section(&["a", "b", "c"]), &CacheConfig::default()).unwrap(),
    );

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.get("gemini").unwrap().stats().key_pool.total, 3);
}

#[test]
fn test_invalidate_group_across_providers() {
    use scrivener_cache::Fingerprint;

    let mut registry = ProviderRegistry::new();
    for name in ["gemini", "claude"] {
        registry.register(Provider::new(name, &section(&["k"]), &CacheConfig::default()).unwrap());
    }
    for name in ["gemini", "claude"] {
        let provider = registry.get(name).unwrap();
        provider
            .cache()
            .put(&Fingerprint::from("doc"), "v".to_string(), Some("batch-42"));
    }

    assert_eq!(registry.invalidate_group("batch-42"), 2);
    assert_eq!(registry.invalidate_group("batch-42"), 0);
}
