//! Core DDNS engine
//!
//! The DdnsEngine is the reconciliation driver. For each address family it:
//! - Asks the IP cache whether the current address still needs applying
//! - Resolves each domain's zone and lists its matching records
//! - Creates the record if none exists, updates it if it diverges, or
//!   leaves it untouched if it already matches
//! - Records the outcome on the domain and advances the cache
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │ IpDiscovery │─── current v4/v6 ───┐
//! └─────────────┘                     │
//!                                     ▼
//!                            ┌──────────────┐
//!                            │ DdnsEngine   │◀──── DomainSet (&mut)
//!                            └──────────────┘
//!                                     │
//!         ┌───────────────────────────┼───────────────────────────┐
//!         │                           │                           │
//!         ▼                           ▼                           ▼
//! ┌─────────────┐           ┌──────────────┐           ┌─────────────┐
//! │  IpCaches   │           │ DnsProvider  │           │   Events    │
//! │ (gate)      │           │ (zone/record)│           │  (notify)   │
//! └─────────────┘           └──────────────┘           └─────────────┘
//! ```
//!
//! ## Pass Flow (per family)
//!
//! 1. No candidate domains, or no address discovered → skip the pass
//! 2. Cache hit → skip the pass, consume one hit
//! 3. Reconcile every domain on a bounded pool; a failure is recorded on
//!    that domain only
//! 4. At least one success, all at the current address → advance the cache
//!
//! The IPv4 and IPv6 passes of a cycle run concurrently; they touch
//! disjoint record types and disjoint cache entries.
//!
//! ## Multiple Matches
//!
//! When a provider lists more than one record for the same name and type,
//! the engine operates on the first one and leaves the rest untouched. The
//! choice is only as deterministic as the provider's ordering.

mod report;

pub use report::{CycleReport, DomainOutcome, DomainReport, PassReport, PassStatus};

use crate::cache::IpCaches;
use crate::config::DdnsConfig;
use crate::domain::{Domain, DomainSet, UpdateStatus};
use crate::error::{Error, Result};
use crate::traits::{AddressFamily, DnsProvider, IpDiscovery, RecordChange};
use futures::StreamExt;
use std::collections::BTreeMap;
use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

/// Events emitted by the DdnsEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A pass began reconciling domains against the provider
    PassStarted {
        family: AddressFamily,
        ip: IpAddr,
        domains: usize,
    },

    /// A pass was skipped without touching the provider
    PassSkipped {
        family: AddressFamily,
        status: PassStatus,
    },

    /// One domain finished reconciling
    DomainReconciled {
        family: AddressFamily,
        domain: String,
        status: UpdateStatus,
        detail: String,
    },

    /// The IP cache now holds this address
    CacheAdvanced {
        family: AddressFamily,
        ip: IpAddr,
    },
}

/// Owned copy of what one domain's reconciliation needs
struct DomainJob {
    root_domain: String,
    full_name: String,
    params: BTreeMap<String, String>,
}

impl From<&Domain> for DomainJob {
    fn from(domain: &Domain) -> Self {
        Self {
            root_domain: domain.root_domain().to_string(),
            full_name: domain.full_name(),
            params: domain.custom_params().clone(),
        }
    }
}

/// Core DDNS engine
///
/// ## Lifecycle
///
/// 1. Create with [`DdnsEngine::new()`], sharing one [`IpCaches`]
/// 2. Call [`DdnsEngine::run_cycle()`] per scheduled tick, or let
///    [`DdnsEngine::run_until()`] drive the ticks
/// 3. Drop to cleanup
///
/// ## Concurrency
///
/// Domains within a pass are reconciled concurrently, at most
/// `concurrency` at a time. Each domain's status is written only by its
/// own reconciliation. The cache is the only shared mutable state and is
/// written at most once, after all domains of the pass finished.
///
/// No call is retried here: a failure marks the domain `Failed` and the
/// next scheduled cycle tries again.
pub struct DdnsEngine {
    /// DNS provider for zone/record operations
    provider: Arc<dyn DnsProvider>,

    /// Last applied address per family
    caches: Arc<IpCaches>,

    /// Configured TTL override
    ttl: Option<u32>,

    /// Bounded per-pass worker count
    concurrency: usize,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,

    /// Set once the receiver is gone
    events_closed: AtomicBool,
}

impl DdnsEngine {
    /// Create a new DDNS engine
    ///
    /// # Parameters
    ///
    /// - `provider`: DNS provider implementation
    /// - `caches`: Process-wide IP caches
    /// - `config`: DDNS configuration snapshot
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        provider: Arc<dyn DnsProvider>,
        caches: Arc<IpCaches>,
        config: &DdnsConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let engine = Self {
            provider,
            caches,
            ttl: config.ttl,
            concurrency: config.engine.concurrency,
            event_tx: tx,
            events_closed: AtomicBool::new(false),
        };

        Ok((engine, rx))
    }

    /// The configured TTL, or the provider's default when unset
    pub fn effective_ttl(&self) -> u32 {
        self.ttl.unwrap_or_else(|| self.provider.default_ttl())
    }

    /// Run one reconciliation cycle: both families, concurrently
    pub async fn run_cycle(
        &self,
        discovery: &dyn IpDiscovery,
        domains: &mut DomainSet,
    ) -> CycleReport {
        let (ipv4, ipv6) = tokio::join!(discovery.current_ipv4(), discovery.current_ipv6());

        let DomainSet {
            ipv4: v4_domains,
            ipv6: v6_domains,
        } = domains;

        let (ipv4, ipv6) = tokio::join!(
            self.reconcile(AddressFamily::V4, ipv4, v4_domains),
            self.reconcile(AddressFamily::V6, ipv6, v6_domains),
        );

        CycleReport { ipv4, ipv6 }
    }

    /// Run cycles every `interval` until `shutdown` resolves
    ///
    /// The first cycle runs immediately. A cycle in flight when `shutdown`
    /// resolves is abandoned; domains keep whatever status they last
    /// recorded.
    pub async fn run_until<F>(
        &self,
        discovery: &dyn IpDiscovery,
        domains: &mut DomainSet,
        interval: Duration,
        shutdown: F,
    ) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        if interval.is_zero() {
            return Err(Error::config("Cycle interval must be > 0"));
        }

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received, engine stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = &mut shutdown => {
                            info!("Shutdown signal received mid-cycle, engine stopped");
                            return Ok(());
                        }
                        report = self.run_cycle(discovery, domains) => {
                            info!("Cycle finished: {}", report);
                        }
                    }
                }
            }
        }
    }

    /// Run one reconciliation pass for `family`
    ///
    /// # Parameters
    ///
    /// - `family`: Address family of this pass
    /// - `ip`: Discovered address (`None` = unknown this cycle)
    /// - `domains`: Candidate domains; their statuses are overwritten
    pub async fn reconcile(
        &self,
        family: AddressFamily,
        ip: Option<IpAddr>,
        domains: &mut [Domain],
    ) -> PassReport {
        if domains.is_empty() {
            debug!("No {} domains configured, skipping pass", family);
            return self.skipped(family, ip, PassStatus::NoDomains);
        }

        let Some(ip) = ip else {
            warn!("{} address unavailable this cycle, skipping pass", family);
            return self.skipped(family, None, PassStatus::NoAddress);
        };

        if !family.contains(&ip) {
            warn!("Discovered address {} is not {}, skipping pass", ip, family);
            return self.skipped(family, Some(ip), PassStatus::NoAddress);
        }

        let cache = self.caches.get(family);
        if cache.snapshot().await.is_fresh(ip) {
            debug!("{} address {} unchanged since last pass", family, ip);
            cache.record_hit().await;
            return self.skipped(family, Some(ip), PassStatus::Cached);
        }

        self.emit_event(EngineEvent::PassStarted {
            family,
            ip,
            domains: domains.len(),
        });

        let jobs: Vec<DomainJob> = domains.iter().map(DomainJob::from).collect();
        let mut outcomes = futures::stream::iter(jobs.into_iter().enumerate())
            .map(|(index, job)| async move {
                let outcome = self.reconcile_domain(family, ip, &job).await;
                (index, job.full_name, outcome)
            })
            .buffered(self.concurrency.max(1));

        let mut reports = Vec::with_capacity(domains.len());
        while let Some((index, name, outcome)) = outcomes.next().await {
            domains[index].set_status(outcome.status());
            self.log_outcome(family, &name, &outcome);
            self.emit_event(EngineEvent::DomainReconciled {
                family,
                domain: name.clone(),
                status: outcome.status(),
                detail: outcome.to_string(),
            });
            reports.push(DomainReport {
                domain: name,
                outcome,
            });
        }

        let mut report = PassReport {
            family,
            ip: Some(ip),
            status: PassStatus::Completed,
            domains: reports,
            cache_advanced: false,
        };

        let succeeded: Vec<&DomainOutcome> = report
            .domains
            .iter()
            .map(|d| &d.outcome)
            .filter(|o| o.is_success())
            .collect();

        if !succeeded.is_empty() && succeeded.iter().all(|o| o.applied_value() == Some(ip)) {
            cache.advance(ip, report.failed() == 0).await;
            report.cache_advanced = true;
            self.emit_event(EngineEvent::CacheAdvanced { family, ip });
        }

        report
    }

    /// Reconcile one domain: resolve zone, list, then create or update
    async fn reconcile_domain(
        &self,
        family: AddressFamily,
        ip: IpAddr,
        job: &DomainJob,
    ) -> DomainOutcome {
        let record_type = family.record_type();

        let zone = match self.provider.resolve_zone(&job.root_domain).await {
            Ok(zone) => zone,
            Err(e) => {
                warn!("Failed to resolve zone for {}: {}", job.full_name, e);
                return DomainOutcome::Failed(Error::zone_resolution(&job.root_domain, e));
            }
        };

        let records = match self
            .provider
            .list_records(&zone, &job.full_name, record_type)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                warn!("Failed to list {} records for {}: {}", record_type, job.full_name, e);
                return DomainOutcome::Failed(Error::record_list(&job.full_name, e));
            }
        };

        let change = RecordChange {
            name: &job.full_name,
            record_type,
            value: ip,
            ttl: self.effective_ttl(),
            params: &job.params,
        };

        match records.first() {
            Some(record) => {
                if records.len() > 1 {
                    debug!(
                        "{} {} records match {}, using the first ({})",
                        records.len(),
                        record_type,
                        job.full_name,
                        record.id
                    );
                }

                if record.points_to(ip) {
                    return DomainOutcome::Unchanged { value: ip };
                }

                match self.provider.update_record(&zone, record, &change).await {
                    Ok(()) => DomainOutcome::Updated {
                        value: ip,
                        previous: record.value.clone(),
                    },
                    Err(e) => DomainOutcome::Failed(Error::record_write(&job.full_name, e)),
                }
            }
            None => match self.provider.create_record(&zone, &change).await {
                Ok(record_id) => DomainOutcome::Created {
                    value: ip,
                    record_id,
                },
                Err(e) => DomainOutcome::Failed(Error::record_write(&job.full_name, e)),
            },
        }
    }

    fn skipped(&self, family: AddressFamily, ip: Option<IpAddr>, status: PassStatus) -> PassReport {
        self.emit_event(EngineEvent::PassSkipped { family, status });
        PassReport {
            family,
            ip,
            status,
            domains: Vec::new(),
            cache_advanced: false,
        }
    }

    fn log_outcome(&self, family: AddressFamily, name: &str, outcome: &DomainOutcome) {
        let provider = self.provider.provider_name();
        match outcome {
            DomainOutcome::Unchanged { value } => {
                info!("[{}] {} {}: no change, still {}", provider, family, name, value)
            }
            DomainOutcome::Created { value, .. } => {
                info!("[{}] {} {}: created -> {}", provider, family, name, value)
            }
            DomainOutcome::Updated { value, previous } => {
                info!("[{}] {} {}: updated {} -> {}", provider, family, name, previous, value)
            }
            DomainOutcome::Failed(e) => {
                warn!("[{}] {} {}: failed: {}", provider, family, name, e)
            }
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // Never block reconciliation on a slow consumer
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(TrySendError::Closed(_)) => {
                if !self.events_closed.swap(true, Ordering::Relaxed) {
                    debug!("Event receiver dropped, engine events are no longer published");
                }
            }
        }
    }
}
