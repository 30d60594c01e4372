//! Test doubles and common utilities for reconciliation contract tests
//!
//! The mock provider keeps zones and records in memory, counts every call,
//! and can be told to fail specific operations for specific names.

#![allow(dead_code)]

use ddns_core::config::{DdnsConfig, EngineConfig, FamilyConfig, ProviderConfig};
use ddns_core::error::{Error, Result};
use ddns_core::traits::{
    AddressFamily, DnsProvider, IpDiscovery, Record, RecordChange, RecordType, Zone,
};
use ddns_core::{DdnsEngine, DomainSet, EngineEvent, IpCaches};
use std::collections::{BTreeMap, HashSet};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Default TTL reported by the mock provider
pub const MOCK_DEFAULT_TTL: u32 = 600;

/// A create call as seen by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCall {
    pub zone_id: String,
    pub name: String,
    pub record_type: RecordType,
    pub value: String,
    pub ttl: u32,
    pub params: BTreeMap<String, String>,
}

/// An update call as seen by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCall {
    pub record_id: String,
    pub name: String,
    pub value: String,
    pub ttl: u32,
}

#[derive(Default)]
struct MockState {
    zones: Vec<Zone>,
    records: Vec<(String, Record)>,
    creates: Vec<CreateCall>,
    updates: Vec<UpdateCall>,
    fail_zone: HashSet<String>,
    fail_list: HashSet<String>,
    fail_write: HashSet<String>,
    next_id: usize,
}

/// In-memory DnsProvider that tracks calls
#[derive(Default)]
pub struct MockDnsProvider {
    state: Mutex<MockState>,
    resolve_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl MockDnsProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add a zone; its id is `zone-<name>`
    pub fn add_zone(&self, name: &str) -> String {
        let id = format!("zone-{}", name);
        self.state.lock().unwrap().zones.push(Zone {
            id: id.clone(),
            name: name.to_string(),
        });
        id
    }

    /// Seed an existing record; returns its id
    pub fn add_record(&self, zone: &str, name: &str, record_type: RecordType, value: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("seed-{}", state.next_id);
        state.records.push((
            format!("zone-{}", zone),
            Record {
                id: id.clone(),
                name: name.to_string(),
                record_type,
                value: value.to_string(),
                ttl: Some(MOCK_DEFAULT_TTL),
            },
        ));
        id
    }

    pub fn fail_zone_for(&self, root: &str) {
        self.state.lock().unwrap().fail_zone.insert(root.to_string());
    }

    pub fn fail_list_for(&self, name: &str) {
        self.state.lock().unwrap().fail_list.insert(name.to_string());
    }

    pub fn fail_write_for(&self, name: &str) {
        self.state.lock().unwrap().fail_write.insert(name.to_string());
    }

    pub fn heal(&self) {
        let mut state = self.state.lock().unwrap();
        state.fail_zone.clear();
        state.fail_list.clear();
        state.fail_write.clear();
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> Vec<CreateCall> {
        self.state.lock().unwrap().creates.clone()
    }

    pub fn updates(&self) -> Vec<UpdateCall> {
        self.state.lock().unwrap().updates.clone()
    }

    pub fn write_calls(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.creates.len() + state.updates.len()
    }

    /// Current value of a record by id
    pub fn record_value(&self, id: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .find(|(_, r)| r.id == id)
            .map(|(_, r)| r.value.clone())
    }

    /// Change a record's value as if edited outside the engine
    pub fn set_record_value(&self, id: &str, value: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some((_, record)) = state.records.iter_mut().find(|(_, r)| r.id == id) {
            record.value = value.to_string();
        }
    }

    /// Records currently held for a name and type
    pub fn records_for(&self, name: &str, record_type: RecordType) -> Vec<Record> {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|(_, r)| r.name == name && r.record_type == record_type)
            .map(|(_, r)| r.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl DnsProvider for MockDnsProvider {
    async fn resolve_zone(&self, domain_name: &str) -> Result<Zone> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();

        if state.fail_zone.contains(domain_name) {
            return Err(Error::provider("mock", "zone lookup rejected"));
        }

        let matches: Vec<&Zone> = state.zones.iter().filter(|z| z.name == domain_name).collect();
        match matches.as_slice() {
            [zone] => Ok((*zone).clone()),
            [] => Err(Error::not_found(format!("site not found for domain: {}", domain_name))),
            _ => Err(Error::ambiguous(domain_name.to_string())),
        }
    }

    async fn list_records(
        &self,
        zone: &Zone,
        full_name: &str,
        record_type: RecordType,
    ) -> Result<Vec<Record>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();

        if state.fail_list.contains(full_name) {
            return Err(Error::http("connection reset"));
        }

        Ok(state
            .records
            .iter()
            .filter(|(zone_id, r)| {
                *zone_id == zone.id && r.name == full_name && r.record_type == record_type
            })
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn create_record(&self, zone: &Zone, change: &RecordChange<'_>) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.creates.push(CreateCall {
            zone_id: zone.id.clone(),
            name: change.name.to_string(),
            record_type: change.record_type,
            value: change.value.to_string(),
            ttl: change.ttl,
            params: change.params.clone(),
        });

        if state.fail_write.contains(change.name) {
            return Err(Error::provider("mock", "InvalidParameter"));
        }

        state.next_id += 1;
        let id = format!("rec-{}", state.next_id);
        state.records.push((
            zone.id.clone(),
            Record {
                id: id.clone(),
                name: change.name.to_string(),
                record_type: change.record_type,
                value: change.value.to_string(),
                ttl: Some(change.ttl),
            },
        ));
        Ok(id)
    }

    async fn update_record(
        &self,
        _zone: &Zone,
        record: &Record,
        change: &RecordChange<'_>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.updates.push(UpdateCall {
            record_id: record.id.clone(),
            name: change.name.to_string(),
            value: change.value.to_string(),
            ttl: change.ttl,
        });

        if state.fail_write.contains(change.name) {
            return Err(Error::provider("mock", "Forbidden"));
        }

        let stored = state
            .records
            .iter_mut()
            .find(|(_, r)| r.id == record.id)
            .ok_or_else(|| Error::not_found(record.id.clone()))?;
        stored.1.value = change.value.to_string();
        stored.1.ttl = Some(change.ttl);
        Ok(())
    }

    fn default_ttl(&self) -> u32 {
        MOCK_DEFAULT_TTL
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// IpDiscovery returning whatever the test sets
#[derive(Default)]
pub struct StaticIpDiscovery {
    v4: Mutex<Option<IpAddr>>,
    v6: Mutex<Option<IpAddr>>,
}

impl StaticIpDiscovery {
    pub fn new(v4: Option<&str>, v6: Option<&str>) -> Self {
        Self {
            v4: Mutex::new(v4.map(|s| s.parse().unwrap())),
            v6: Mutex::new(v6.map(|s| s.parse().unwrap())),
        }
    }

    pub fn set_v4(&self, ip: Option<&str>) {
        *self.v4.lock().unwrap() = ip.map(|s| s.parse().unwrap());
    }
}

#[async_trait::async_trait]
impl IpDiscovery for StaticIpDiscovery {
    async fn current(&self, family: AddressFamily) -> Option<IpAddr> {
        match family {
            AddressFamily::V4 => *self.v4.lock().unwrap(),
            AddressFamily::V6 => *self.v6.lock().unwrap(),
        }
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

/// Configuration for the mock provider with the given domain entries
pub fn mock_config(ipv4: &[&str], ipv6: &[&str]) -> DdnsConfig {
    let mut config = DdnsConfig::new(ProviderConfig::Custom {
        factory: "mock".to_string(),
        config: serde_json::json!({}),
    });
    config.ipv4 = FamilyConfig::with_domains(ipv4.iter().copied());
    config.ipv6 = FamilyConfig::with_domains(ipv6.iter().copied());
    config.engine = EngineConfig {
        concurrency: 4,
        force_compare_cycles: 5,
        event_channel_capacity: 100,
        ..EngineConfig::default()
    };
    config
}

/// Everything a contract test needs, wired together
pub struct Harness {
    pub provider: Arc<MockDnsProvider>,
    pub caches: Arc<IpCaches>,
    pub engine: DdnsEngine,
    pub events: mpsc::Receiver<EngineEvent>,
    pub domains: DomainSet,
}

impl Harness {
    pub fn new(config: DdnsConfig) -> Self {
        Self::with_provider(config, MockDnsProvider::new())
    }

    pub fn with_provider(config: DdnsConfig, provider: Arc<MockDnsProvider>) -> Self {
        let caches = Arc::new(IpCaches::new(config.engine.force_compare_cycles));
        let (engine, events) = DdnsEngine::new(provider.clone(), caches.clone(), &config)
            .expect("engine construction succeeds");
        let domains = DomainSet::from_config(&config).expect("domains parse");

        Self {
            provider,
            caches,
            engine,
            events,
            domains,
        }
    }

    /// Drain all events emitted so far
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}
