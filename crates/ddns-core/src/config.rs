//! Configuration types for the DDNS system
//!
//! This module defines all configuration structures used throughout the crate.
//! A loaded [`DdnsConfig`] is an immutable snapshot; reloading replaces it
//! wholesale between passes.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::domain::Domain;
use crate::traits::AddressFamily;

/// Main DDNS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DdnsConfig {
    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// IPv4 tracking
    #[serde(default)]
    pub ipv4: FamilyConfig,

    /// IPv6 tracking
    #[serde(default)]
    pub ipv6: FamilyConfig,

    /// TTL override; absent means the provider's default
    #[serde(default)]
    pub ttl: Option<u32>,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl DdnsConfig {
    /// Create a new configuration for a provider with no domains
    pub fn new(provider: ProviderConfig) -> Self {
        Self {
            provider,
            ipv4: FamilyConfig::default(),
            ipv6: FamilyConfig::default(),
            ttl: None,
            engine: EngineConfig::default(),
        }
    }

    /// Load a configuration snapshot from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: DdnsConfig = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Tracking settings for one family
    pub fn family(&self, family: AddressFamily) -> &FamilyConfig {
        match family {
            AddressFamily::V4 => &self.ipv4,
            AddressFamily::V6 => &self.ipv6,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.provider.validate()?;
        self.engine.validate()?;

        let mut total = 0;
        for family in AddressFamily::ALL {
            let settings = self.family(family);
            if !settings.enabled {
                continue;
            }

            let mut seen = HashSet::new();
            for entry in &settings.domains {
                let domain = Domain::parse(entry)?;
                if !seen.insert((domain.sub_domain().to_string(), domain.root_domain().to_string())) {
                    return Err(crate::Error::config(format!(
                        "Duplicate {} domain: {}",
                        family,
                        domain.full_name()
                    )));
                }
            }
            total += settings.domains.len();
        }

        if total == 0 {
            return Err(crate::Error::config("No domains configured"));
        }

        if let Some(ttl) = self.ttl
            && ttl == 0
        {
            return Err(crate::Error::config("TTL must be > 0"));
        }

        Ok(())
    }
}

/// Per-family tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyConfig {
    /// Whether this family is tracked at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Discovery endpoints, tried in order (empty means built-in defaults)
    #[serde(default)]
    pub urls: Vec<String>,

    /// Domain entries (`host[?k=v&...]`, host optionally `sub:root`)
    #[serde(default)]
    pub domains: Vec<String>,
}

impl FamilyConfig {
    /// Enabled family with the given domain entries
    pub fn with_domains<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled: true,
            urls: Vec::new(),
            domains: domains.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for FamilyConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            urls: Vec::new(),
            domains: Vec::new(),
        }
    }
}

/// DNS provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Alibaba Cloud ESA (sites + signed RPC API)
    Esa {
        /// Account access key ID
        access_key_id: String,
        /// Account access key secret
        access_key_secret: String,
        /// API endpoint override
        #[serde(default)]
        endpoint: Option<String>,
    },

    /// Cloudflare provider
    Cloudflare {
        /// Cloudflare API token
        api_token: String,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Esa {
                access_key_id,
                access_key_secret,
                ..
            } => {
                if access_key_id.is_empty() || access_key_secret.is_empty() {
                    return Err(crate::Error::config(
                        "ESA access key ID and secret cannot be empty",
                    ));
                }
                Ok(())
            }
            ProviderConfig::Cloudflare { api_token } => {
                if api_token.is_empty() {
                    return Err(crate::Error::config("Cloudflare API token cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom provider config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Esa { .. } => "esa",
            ProviderConfig::Cloudflare { .. } => "cloudflare",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds between reconciliation cycles (used by the polling loop)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Maximum domains reconciled concurrently within one pass
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Consecutive cache hits after which a pass is forced to re-check the
    /// provider even though the address is unchanged
    ///
    /// Set to 0 to re-check on every cycle.
    #[serde(default = "default_force_compare_cycles")]
    pub force_compare_cycles: u32,

    /// Timeout for each provider request (in seconds)
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_secs == 0 {
            return Err(crate::Error::config("Cycle interval must be > 0"));
        }
        if self.concurrency == 0 {
            return Err(crate::Error::config("Concurrency must be > 0"));
        }
        if self.http_timeout_secs == 0 {
            return Err(crate::Error::config("HTTP timeout must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            concurrency: default_concurrency(),
            force_compare_cycles: default_force_compare_cycles(),
            http_timeout_secs: default_http_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    300
}

fn default_concurrency() -> usize {
    4
}

fn default_force_compare_cycles() -> u32 {
    5
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_event_channel_capacity() -> usize {
    1000
}
