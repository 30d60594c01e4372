// # DNS Provider Trait
//
// Defines the capability interface every DNS vendor adapter implements.
//
// ## Implementations
//
// - ESA (site-based, signed RPC): `ddns-provider-esa` crate
// - Cloudflare (zone-based, bearer REST): `ddns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::traits::{DnsProvider, RecordChange, RecordType};
//
// let zone = provider.resolve_zone("example.com").await?;
// let records = provider
//     .list_records(&zone, "home.example.com", RecordType::A)
//     .await?;
//
// if records.is_empty() {
//     provider.create_record(&zone, &change).await?;
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

/// Address record type handled by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// IPv6 address record
    #[serde(rename = "AAAA")]
    Aaaa,
}

impl RecordType {
    /// Wire name of the record type
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }

    /// Parse a wire name, case-insensitively
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("A") {
            Some(RecordType::A)
        } else if s.eq_ignore_ascii_case("AAAA") {
            Some(RecordType::Aaaa)
        } else {
            None
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-side grouping that owns a domain's records (zone or site)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    /// Opaque provider-assigned identifier
    pub id: String,
    /// Human-readable zone name
    pub name: String,
}

/// A remote address record as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Opaque provider-assigned identifier
    pub id: String,
    /// Record name (full domain name)
    pub name: String,
    /// Record type
    pub record_type: RecordType,
    /// Current value as reported by the provider
    pub value: String,
    /// TTL reported by the provider, if any
    pub ttl: Option<u32>,
}

impl Record {
    /// Check whether the record already points at `ip`
    ///
    /// Values that parse as addresses are compared semantically, so
    /// `2001:db8::1` matches `2001:0db8:0000::0001`. Anything else falls
    /// back to exact text comparison.
    pub fn points_to(&self, ip: IpAddr) -> bool {
        match self.value.trim().parse::<IpAddr>() {
            Ok(current) => current == ip,
            Err(_) => self.value == ip.to_string(),
        }
    }
}

/// The desired state for one record, handed to create/update
#[derive(Debug, Clone, Copy)]
pub struct RecordChange<'a> {
    /// Full domain name
    pub name: &'a str,
    /// Record type
    pub record_type: RecordType,
    /// Address to write
    pub value: IpAddr,
    /// TTL to apply (already resolved against the provider default)
    pub ttl: u32,
    /// Opaque per-domain vendor parameters, passed through untouched
    pub params: &'a BTreeMap<String, String>,
}

/// Trait for DNS provider implementations
///
/// This trait hides one vendor's wire format, authentication and error
/// mapping behind four operations. The reconciliation driver depends only
/// on this trait and never on a vendor type.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks;
/// the driver calls them concurrently for sibling domains.
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to their endpoints only
/// - ✅ Parse provider-specific responses
/// - ✅ Apply their own default TTL policy
///
/// ## Forbidden Capabilities
/// - ❌ Implement retry logic or backoff (the polling loop owns retry cadence)
/// - ❌ Cache zones or records across calls (both are re-read every pass)
/// - ❌ Decide whether a write is needed (owned by `DdnsEngine`)
/// - ❌ Interpret errors for the driver (any failure is a plain `Err`)
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Resolve the zone owning `domain_name` by exact name match
    ///
    /// # Returns
    ///
    /// - `Ok(Zone)`: Exactly one zone has this name
    /// - `Err(Error::NotFound)`: No zone has this name
    /// - `Err(Error::Ambiguous)`: More than one zone has this name
    ///
    /// Prefix or substring matches must never be accepted.
    async fn resolve_zone(&self, domain_name: &str) -> Result<Zone, crate::Error>;

    /// List records with exactly this name and type
    ///
    /// An empty vector is the normal first-run state, not an error.
    async fn list_records(
        &self,
        zone: &Zone,
        full_name: &str,
        record_type: RecordType,
    ) -> Result<Vec<Record>, crate::Error>;

    /// Create a record
    ///
    /// Only called after `list_records` returned no match for the same
    /// name and type within the same pass.
    ///
    /// # Returns
    ///
    /// The provider-assigned record identifier
    async fn create_record(
        &self,
        zone: &Zone,
        change: &RecordChange<'_>,
    ) -> Result<String, crate::Error>;

    /// Replace the value of an existing record
    ///
    /// This is a full replace, not a delta.
    async fn update_record(
        &self,
        zone: &Zone,
        record: &Record,
        change: &RecordChange<'_>,
    ) -> Result<(), crate::Error>;

    /// TTL applied when the configuration does not set one
    fn default_ttl(&self) -> u32;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance from configuration
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
        settings: &crate::config::EngineConfig,
    ) -> Result<Box<dyn DnsProvider>, crate::Error>;
}
