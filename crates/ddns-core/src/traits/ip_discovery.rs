// # IP Discovery Trait
//
// Defines the collaborator that tells the engine the host's current public
// address for each address family.
//
// ## Implementations
//
// - HTTP echo services: `ddns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::traits::IpDiscovery;
//
// if let Some(ip) = discovery.current_ipv4().await {
//     println!("public IPv4: {}", ip);
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

use crate::traits::RecordType;

/// Address family (IPv4 or IPv6), each reconciled independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    /// Both families, in the order passes are reported
    pub const ALL: [AddressFamily; 2] = [AddressFamily::V4, AddressFamily::V6];

    /// The address record type for this family
    pub fn record_type(&self) -> RecordType {
        match self {
            AddressFamily::V4 => RecordType::A,
            AddressFamily::V6 => RecordType::Aaaa,
        }
    }

    /// Family of a concrete address
    pub fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }

    /// Check whether `ip` belongs to this family
    pub fn contains(&self, ip: &IpAddr) -> bool {
        Self::of(ip) == *self
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::V4 => f.write_str("IPv4"),
            AddressFamily::V6 => f.write_str("IPv6"),
        }
    }
}

/// Trait for IP discovery implementations
///
/// `None` means "unknown this cycle". It is never an error: the engine
/// skips the whole pass for that family so a transient discovery outage
/// cannot erase existing DNS records.
///
/// # Trust Level: Semi-Trusted
///
/// ## Allowed Capabilities
/// - ✅ Perform I/O needed to learn the address (HTTP, sockets)
///
/// ## Forbidden Capabilities
/// - ❌ Perform DNS updates (use `DnsProvider`)
/// - ❌ Touch the IP cache (owned by `DdnsEngine`)
/// - ❌ Make decisions about when to update DNS
#[async_trait]
pub trait IpDiscovery: Send + Sync {
    /// Current address for `family`, or `None` if it could not be determined
    ///
    /// Implementations must only ever return an address of the requested
    /// family.
    async fn current(&self, family: AddressFamily) -> Option<IpAddr>;

    /// Current public IPv4 address
    async fn current_ipv4(&self) -> Option<IpAddr> {
        self.current(AddressFamily::V4).await
    }

    /// Current public IPv6 address
    async fn current_ipv6(&self) -> Option<IpAddr> {
        self.current(AddressFamily::V6).await
    }

    /// Name of the discovery method (for logging)
    fn name(&self) -> &'static str;
}

/// Helper trait for constructing IP discovery from configuration
pub trait IpDiscoveryFactory: Send + Sync {
    /// Create an IpDiscovery instance from the full configuration
    fn create(
        &self,
        config: &crate::config::DdnsConfig,
    ) -> Result<Box<dyn IpDiscovery>, crate::Error>;
}
