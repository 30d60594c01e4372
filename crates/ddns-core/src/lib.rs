// # ddns-core
//
// Core library for the DDNS reconciliation engine.
//
// ## Architecture Overview
//
// This library keeps configured hostnames pointing at the host's current
// public address:
// - **DnsProvider**: Capability trait every DNS vendor adapter implements
// - **IpDiscovery**: Trait for learning the current IPv4/IPv6 address
// - **RequestSigner**: Pluggable request authentication for signed APIs
// - **DomainSet**: Configured domains and their last update status
// - **IpCaches**: Last applied address per family, gates redundant passes
// - **DdnsEngine**: Reconciliation driver (lookup → compare → create/update)
// - **ProviderRegistry**: Plugin-based registry for providers and discovery
//
// ## Design Principles
//
// 1. **Provider-agnostic driver**: The engine never sees a vendor type
// 2. **Partial failure isolation**: One domain's failure never aborts a pass
// 3. **No duplicate creates**: Create only after listing found nothing
// 4. **Library-First**: The daemon is a thin shell over this crate

pub mod traits;
pub mod engine;
pub mod registry;
pub mod config;
pub mod domain;
pub mod cache;
pub mod error;

// Re-export core types for convenience
pub use traits::{AddressFamily, DnsProvider, IpDiscovery, RequestSigner};
pub use engine::{DdnsEngine, EngineEvent};
pub use registry::ProviderRegistry;
pub use config::{DdnsConfig, EngineConfig, FamilyConfig, ProviderConfig};
pub use domain::{Domain, DomainSet, UpdateStatus};
pub use cache::{IpCache, IpCaches};
pub use error::{Error, Result};
