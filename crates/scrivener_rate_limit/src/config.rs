//! Configuration structures for providers and the result cache.
//!
//! This module provides TOML-based configuration. The configuration system
//! supports:
//! - Bundled defaults (include_str! from scrivener.toml)
//! - User overrides (./scrivener.toml or ~/.config/scrivener/scrivener.toml)
//! - Automatic merging with user values taking precedence
//!
//! Credentials may be listed inline (`keys`) or read from an environment
//! variable holding a comma-separated list (`keys_env`).

use crate::{ClassificationConfig, ErrorClassifier, RetryPolicy};
use config::{Config, File, FileFormat};
use scrivener_cache::CacheConfig;
use scrivener_error::{ConfigError, ScrivenerError, ScrivenerResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

/// Rate, rotation and retry settings for one provider.
///
/// # Example
///
/// ```toml
/// [providers.gemini]
/// keys_env = "GEMINI_API_KEYS"
/// window_ms = 60_000
/// max_per_window = 12
/// min_interval_ms = 5_000
/// max_retries = 5
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Inline credentials (never serialized back out)
    #[serde(default, skip_serializing)]
    pub keys: Vec<String>,

    /// Environment variable holding comma-separated credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys_env: Option<String>,

    /// Sliding window length in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Maximum dispatches inside one window
    #[serde(default = "default_max_per_window")]
    pub max_per_window: u32,

    /// Minimum spacing between dispatches in milliseconds
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// How long a key stays out of rotation after a quota failure
    #[serde(default = "default_disable_duration_ms")]
    pub disable_duration_ms: u64,

    /// Total attempts per request, including the first
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before retrying a quota failure with another key
    #[serde(default = "default_rate_limit_retry_delay_ms")]
    pub rate_limit_retry_delay_ms: u64,

    /// First overload backoff
    #[serde(default = "default_overload_base_delay_ms")]
    pub overload_base_delay_ms: u64,

    /// Upper bound on any overload backoff
    #[serde(default = "default_overload_max_delay_ms")]
    pub overload_max_delay_ms: u64,

    /// Add random jitter to overload backoff
    #[serde(default = "default_jitter")]
    pub jitter: bool,

    /// Status / provider code to error class table
    #[serde(default)]
    pub classification: ClassificationConfig,
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_max_per_window() -> u32 {
    12
}

fn default_min_interval_ms() -> u64 {
    5_000
}

fn default_disable_duration_ms() -> u64 {
    60_000
}

fn default_max_retries() -> u32 {
    5
}

fn default_rate_limit_retry_delay_ms() -> u64 {
    2_000
}

fn default_overload_base_delay_ms() -> u64 {
    30_000
}

fn default_overload_max_delay_ms() -> u64 {
    300_000
}

fn default_jitter() -> bool {
    true
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            keys_env: None,
            window_ms: default_window_ms(),
            max_per_window: default_max_per_window(),
            min_interval_ms: default_min_interval_ms(),
            disable_duration_ms: default_disable_duration_ms(),
            max_retries: default_max_retries(),
            rate_limit_retry_delay_ms: default_rate_limit_retry_delay_ms(),
            overload_base_delay_ms: default_overload_base_delay_ms(),
            overload_max_delay_ms: default_overload_max_delay_ms(),
            jitter: default_jitter(),
            classification: ClassificationConfig::default(),
        }
    }
}

impl ProviderConfig {
    /// Credentials from `keys` followed by those in `keys_env`, deduplicated.
    pub fn resolved_keys(&self) -> Vec<String> {
        let from_env = self
            .keys_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .unwrap_or_default();

        let mut keys: Vec<String> = Vec::new();
        for key in self
            .keys
            .iter()
            .map(|k| k.trim().to_string())
            .chain(from_env.split(',').map(|k| k.trim().to_string()))
        {
            if !key.is_empty() && !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    /// Check the numeric settings of the provider named `name`.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.window_ms == 0 {
            return Err(ConfigError::for_provider(name, "window_ms must be positive"));
        }
        if self.max_per_window == 0 {
            return Err(ConfigError::for_provider(name, "max_per_window must be positive"));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::for_provider(name, "max_retries must be at least 1"));
        }
        if self.disable_duration_ms == 0 {
            return Err(ConfigError::for_provider(name, "disable_duration_ms must be positive"));
        }
        if self.overload_base_delay_ms > self.overload_max_delay_ms {
            return Err(ConfigError::for_provider(
                name,
                "overload_base_delay_ms exceeds overload_max_delay_ms",
            ));
        }
        Ok(())
    }

    /// Sliding window length.
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Minimum dispatch spacing.
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    /// Key cool-down after a quota failure.
    pub fn disable_duration(&self) -> Duration {
        Duration::from_millis(self.disable_duration_ms)
    }

    /// Retry policy described by this section.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries)
            .with_rate_limit_delay(Duration::from_millis(self.rate_limit_retry_delay_ms))
            .with_overload_delays(
                Duration::from_millis(self.overload_base_delay_ms),
                Duration::from_millis(self.overload_max_delay_ms),
            )
            .with_jitter(self.jitter)
    }

    /// Error classifier described by this section.
    pub fn classifier(&self) -> ErrorClassifier {
        ErrorClassifier::from(&self.classification)
    }
}

/// Top-level Scrivener configuration.
///
/// Loads configuration from TOML files with a precedence system:
/// 1. Bundled defaults (include_str! from scrivener.toml)
/// 2. User override (~/.config/scrivener/scrivener.toml, then ./scrivener.toml)
///
/// # Example
///
/// ```no_run
/// use scrivener_rate_limit::ScrivenerConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ScrivenerConfig::load()?;
/// let gemini = config.provider("gemini").unwrap();
/// println!("Gemini window: {} per {}ms", gemini.max_per_window, gemini.window_ms);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
pub struct ScrivenerConfig {
    /// Map of provider name to provider configuration
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Result cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
}

impl ScrivenerConfig {
    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> ScrivenerResult<Self> {
        debug!("Loading configuration from file");

        let config: Self = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .map_err(|e| {
                ScrivenerError::from(ConfigError::new(format!(
                    "Failed to read configuration from {}: {}",
                    path.as_ref().display(),
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                ScrivenerError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration with precedence: user override > bundled default.
    ///
    /// Configuration sources in order of precedence (later sources override earlier):
    /// 1. Bundled defaults (scrivener.toml shipped with the library)
    /// 2. User config in home directory (~/.config/scrivener/scrivener.toml)
    /// 3. User config in current directory (./scrivener.toml)
    ///
    /// User config files are optional and will be silently skipped if not found.
    #[instrument]
    pub fn load() -> ScrivenerResult<Self> {
        debug!("Loading configuration with precedence: current dir > home dir > bundled defaults");

        const DEFAULT_CONFIG: &str = include_str!("../../../scrivener.toml");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/scrivener/scrivener.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder.add_source(File::with_name("scrivener").required(false));

        let config: Self = builder
            .build()
            .map_err(|e| {
                ScrivenerError::from(ConfigError::new(format!(
                    "Failed to build configuration: {}",
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                ScrivenerError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate every provider section.
    ///
    /// # Errors
    ///
    /// Returns the first invalid provider setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, provider) in &self.providers {
            provider.validate(name)?;
        }
        Ok(())
    }

    /// Get the configuration of a provider.
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }
}
