//! Tracing subscriber setup for the Scrivener binary and embedding services.

use std::env;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Log output settings for the binary or an embedding service.
///
/// ```
/// use scrivener::ObservabilityConfig;
///
/// let config = ObservabilityConfig::new("batch-worker")
///     .with_log_level("scrivener_provider=debug,info")
///     .with_json_logs(true);
/// assert!(config.env_filter().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, derive_getters::Getters, derive_setters::Setters)]
#[setters(prefix = "with_", into)]
pub struct ObservabilityConfig {
    /// Name recorded when the subscriber starts
    #[setters(skip)]
    service_name: String,
    /// `EnvFilter` directives, e.g. `info` or `scrivener_provider=debug,warn`
    log_level: String,
    /// Emit JSON lines instead of text
    json_logs: bool,
}

impl ObservabilityConfig {
    /// Settings for `service_name`, filtering by `RUST_LOG` or `info`.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            json_logs: false,
        }
    }

    /// Settings for the command line: `verbose` forces debug output.
    pub fn for_cli(verbose: bool, json_logs: bool) -> Self {
        let config = Self::new(env!("CARGO_PKG_NAME")).with_json_logs(json_logs);
        if verbose {
            config.with_log_level("debug")
        } else {
            config
        }
    }

    /// Build the filter described by `log_level`.
    ///
    /// # Errors
    ///
    /// Returns an error if `log_level` is not a valid filter directive.
    pub fn env_filter(&self) -> Result<EnvFilter, tracing_subscriber::filter::ParseError> {
        EnvFilter::try_new(&self.log_level)
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self::new(env!("CARGO_PKG_NAME"))
    }
}

/// Install the global subscriber with default configuration.
pub fn init_observability() -> Result<(), Box<dyn std::error::Error>> {
    init_observability_with_config(ObservabilityConfig::default())
}

/// Install the global subscriber.
///
/// Sets up an `EnvFilter` from the configured level and a text or JSON
/// formatter writing to stderr. Fails if a global subscriber is already set.
pub fn init_observability_with_config(
    config: ObservabilityConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = config.env_filter()?;

    let fmt_layer = if config.json_logs {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::debug!(
        service = %config.service_name,
        version = env!("CARGO_PKG_VERSION"),
        json = config.json_logs,
        "Observability initialized"
    );
    Ok(())
}
