//! Plugin-based provider registry
//!
//! The registry allows DNS providers and IP discovery methods to be
//! registered dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ddns_core::registry::ProviderRegistry;
//!
//! let registry = ProviderRegistry::new();
//! ddns_provider_esa::register(&registry);
//! ddns_ip_http::register(&registry);
//!
//! let provider = registry.create_provider(&config.provider, &config.engine)?;
//! let discovery = registry.create_ip_discovery("http", &config)?;
//! ```
//!
//! ## Registration
//!
//! Plug-in crates expose a `register()` function:
//!
//! ```rust,ignore
//! pub fn register(registry: &ProviderRegistry) {
//!     registry.register_provider("esa", Box::new(EsaFactory));
//! }
//! ```

use crate::config::{DdnsConfig, EngineConfig, ProviderConfig};
use crate::error::{Error, Result};
use crate::traits::{DnsProvider, DnsProviderFactory, IpDiscovery, IpDiscoveryFactory};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Provider registry for plugin-based DNS provider creation
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    /// Registered DNS provider factories
    providers: RwLock<HashMap<String, Box<dyn DnsProviderFactory>>>,

    /// Registered IP discovery factories
    ip_discovery: RwLock<HashMap<String, Box<dyn IpDiscoveryFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a DNS provider factory
    ///
    /// # Parameters
    ///
    /// - `name`: Provider type name, matching [`ProviderConfig::type_name`]
    /// - `factory`: Factory object for creating provider instances
    pub fn register_provider(&self, name: impl Into<String>, factory: Box<dyn DnsProviderFactory>) {
        let mut providers = self.providers.write().unwrap_or_else(|e| e.into_inner());
        providers.insert(name.into(), factory);
    }

    /// Register an IP discovery factory
    ///
    /// # Parameters
    ///
    /// - `name`: Discovery method name (e.g., "http")
    /// - `factory`: Factory object for creating discovery instances
    pub fn register_ip_discovery(
        &self,
        name: impl Into<String>,
        factory: Box<dyn IpDiscoveryFactory>,
    ) {
        let mut sources = self.ip_discovery.write().unwrap_or_else(|e| e.into_inner());
        sources.insert(name.into(), factory);
    }

    /// Create a DNS provider from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn DnsProvider>)`: Created provider instance, ready to share
    /// - `Err(Error)`: If provider type is not registered or creation fails
    pub fn create_provider(
        &self,
        config: &ProviderConfig,
        settings: &EngineConfig,
    ) -> Result<Arc<dyn DnsProvider>> {
        let provider_type = config.type_name();
        let providers = self.providers.read().unwrap_or_else(|e| e.into_inner());

        let factory = providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config, settings).map(Arc::from)
    }

    /// Create an IP discovery method by name
    pub fn create_ip_discovery(
        &self,
        name: &str,
        config: &DdnsConfig,
    ) -> Result<Box<dyn IpDiscovery>> {
        let sources = self.ip_discovery.read().unwrap_or_else(|e| e.into_inner());

        let factory = sources
            .get(name)
            .ok_or_else(|| Error::config(format!("Unknown IP discovery method: {}", name)))?;

        factory.create(config)
    }

    /// List all registered provider types
    pub fn list_providers(&self) -> Vec<String> {
        let providers = self.providers.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// List all registered IP discovery methods
    pub fn list_ip_discovery(&self) -> Vec<String> {
        let sources = self.ip_discovery.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = sources.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        let providers = self.providers.read().unwrap_or_else(|e| e.into_inner());
        providers.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockProviderFactory;

    impl DnsProviderFactory for MockProviderFactory {
        fn create(
            &self,
            _config: &ProviderConfig,
            _settings: &EngineConfig,
        ) -> Result<Box<dyn DnsProvider>> {
            Err(Error::not_found("Mock provider not implemented"))
        }
    }

    #[test]
    fn test_registry_registration() {
        let registry = ProviderRegistry::new();

        // Initially empty
        assert!(!registry.has_provider("mock"));

        // Register
        registry.register_provider("mock", Box::new(MockProviderFactory));

        // Now present
        assert!(registry.has_provider("mock"));
        assert_eq!(registry.list_providers(), vec!["mock".to_string()]);
        assert!(registry.list_ip_discovery().is_empty());
    }

    #[test]
    fn test_unknown_provider_type() {
        let registry = ProviderRegistry::new();
        let config = ProviderConfig::Cloudflare {
            api_token: "token".to_string(),
        };

        let err = registry
            .create_provider(&config, &EngineConfig::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("Unknown provider type: cloudflare"));
    }

    #[test]
    fn test_factory_error_propagates() {
        let registry = ProviderRegistry::new();
        registry.register_provider("mock", Box::new(MockProviderFactory));

        let config = ProviderConfig::Custom {
            factory: "mock".to_string(),
            config: serde_json::json!({}),
        };
        let result = registry.create_provider(&config, &EngineConfig::default());
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
