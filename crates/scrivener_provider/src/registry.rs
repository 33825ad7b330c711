//! Builds and holds one provider facade per configured provider.

use crate::{Provider, ProviderStats};
use scrivener_error::{ProviderError, ProviderErrorKind, ScrivenerResult};
use scrivener_rate_limit::ScrivenerConfig;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Registry of provider facades, keyed by provider name.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<Provider>>,
}

impl ProviderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a provider for every configured section that has credentials.
    ///
    /// Sections resolving no credentials are skipped with a warning, so a
    /// deployment can carry settings for providers it has no keys for.
    ///
    /// # Errors
    ///
    /// Returns an error if a section with credentials is invalid.
    #[tracing::instrument(skip_all, fields(configured = config.providers.len()))]
    pub fn from_config(config: &ScrivenerConfig) -> ScrivenerResult<Self> {
        let mut registry = Self::new();
        for (name, section) in &config.providers {
            if section.resolved_keys().is_empty() {
                tracing::warn!(provider = %name, "No credentials configured, skipping provider");
                continue;
            }
            registry.register(Provider::new(name, section, &config.cache)?);
        }

        tracing::info!(providers = registry.len(), "Provider registry ready");
        Ok(registry)
    }

    /// Register a provider.
    ///
    /// A provider with the same name is replaced and a warning logged.
    #[tracing::instrument(skip_all, fields(provider = provider.name()))]
    pub fn register(&mut self, provider: Provider) {
        let name = provider.name().to_string();
        if self.providers.contains_key(&name) {
            tracing::warn!("Provider already registered, replacing it");
        } else {
            tracing::debug!("Registering provider");
        }
        self.providers.insert(name, Arc::new(provider));
    }

    /// Get a provider by name.
    ///
    /// # Errors
    ///
    /// Returns an error if no provider is registered under `name`.
    pub fn get(&self, name: &str) -> ScrivenerResult<Arc<Provider>> {
        self.providers.get(name).cloned().ok_or_else(|| {
            ProviderError::new(ProviderErrorKind::UnknownProvider(name.to_string())).into()
        })
    }

    /// Registered provider names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    /// Stats of every provider, sorted by name.
    pub fn stats(&self) -> Vec<ProviderStats> {
        self.providers.values().map(|p| p.stats()).collect()
    }

    /// Drop `group` from every provider's cache.
    ///
    /// Returns the total number of entries removed.
    pub fn invalidate_group(&self, group: &str) -> usize {
        self.providers
            .values()
            .map(|p| p.invalidate_group(group))
            .sum()
    }

    /// Get number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
