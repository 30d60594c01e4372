//! Core traits for the DDNS system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`DnsProvider`]: Zone/record operations against one DNS vendor
//! - [`IpDiscovery`]: Current public address per family
//! - [`RequestSigner`]: Pluggable request authentication

pub mod ip_discovery;
pub mod dns_provider;
pub mod signer;

pub use ip_discovery::{AddressFamily, IpDiscovery, IpDiscoveryFactory};
pub use dns_provider::{DnsProvider, DnsProviderFactory, Record, RecordChange, RecordType, Zone};
pub use signer::{NoopSigner, RequestSigner};
