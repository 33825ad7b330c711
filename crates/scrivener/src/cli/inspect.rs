//! Handlers for the inspection commands.

use super::OutputFormat;
use scrivener::{
    ConfigError, Fingerprint, ProviderRegistry, ProviderStats, ScrivenerConfig, ScrivenerResult,
};
use std::path::Path;

/// Load configuration from `path`, or from the layered default locations.
pub fn load_config(path: Option<&Path>) -> ScrivenerResult<ScrivenerConfig> {
    match path {
        Some(path) => ScrivenerConfig::from_file(path),
        None => ScrivenerConfig::load(),
    }
}

/// Build every provider with credentials and print its stats.
#[tracing::instrument(skip(config))]
pub fn show_providers(config: &ScrivenerConfig, format: OutputFormat) -> ScrivenerResult<()> {
    let registry = ProviderRegistry::from_config(config)?;
    let stats = registry.stats();

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&stats).map_err(|e| {
                ConfigError::new(format!("Failed to serialize provider stats: {}", e))
            })?;
            println!("{}", json);
        }
        OutputFormat::Human => {
            if stats.is_empty() {
                println!("No providers have credentials configured.");
            }
            for provider in &stats {
                println!("{}", summarize(provider));
            }
        }
    }
    Ok(())
}

fn summarize(stats: &ProviderStats) -> String {
    format!(
        "{}: {}/{} keys active, {}/{} per {}s (min gap {}ms), cache {} entries, queue {}",
        stats.provider,
        stats.key_pool.active,
        stats.key_pool.total,
        stats.rate_window.in_window,
        stats.rate_window.max_per_window,
        stats.rate_window.window_ms / 1_000,
        stats.rate_window.min_interval_ms,
        stats.cache.size,
        stats.queue.state,
    )
}

/// Print the resolved configuration as TOML.
pub fn show_config(config: &ScrivenerConfig) -> ScrivenerResult<()> {
    let toml = toml::to_string_pretty(config)
        .map_err(|e| ConfigError::new(format!("Failed to serialize configuration: {}", e)))?;
    print!("{}", toml);
    Ok(())
}

/// Print the fingerprint of a document.
#[tracing::instrument(skip(prompt), fields(file = %file.display()))]
pub fn show_fingerprint(file: &Path, prompt: &str, kind: &str) -> ScrivenerResult<()> {
    let content = std::fs::read(file).map_err(|e| {
        ConfigError::new(format!("Failed to read {}: {}", file.display(), e))
    })?;
    println!("{}", Fingerprint::derive(&content, prompt, kind));
    Ok(())
}
