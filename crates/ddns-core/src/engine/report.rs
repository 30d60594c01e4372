//! Per-pass and per-cycle reconciliation reports
//!
//! A pass returns a complete [`PassReport`] instead of leaving outcomes
//! scattered across log lines.

use std::fmt;
use std::net::IpAddr;

use crate::domain::UpdateStatus;
use crate::error::Error;
use crate::traits::AddressFamily;

/// Outcome of reconciling one domain in one pass
#[derive(Debug)]
pub enum DomainOutcome {
    /// The remote record already pointed at the address; nothing was written
    Unchanged { value: IpAddr },
    /// No record existed; one was created
    Created { value: IpAddr, record_id: String },
    /// The first matching record was replaced
    Updated { value: IpAddr, previous: String },
    /// Zone resolution, listing, or the write failed
    Failed(Error),
}

impl DomainOutcome {
    /// Check whether the remote record now matches the address
    pub fn is_success(&self) -> bool {
        !matches!(self, DomainOutcome::Failed(_))
    }

    /// Final value of the remote record, if the attempt succeeded
    pub fn applied_value(&self) -> Option<IpAddr> {
        match self {
            DomainOutcome::Unchanged { value }
            | DomainOutcome::Created { value, .. }
            | DomainOutcome::Updated { value, .. } => Some(*value),
            DomainOutcome::Failed(_) => None,
        }
    }

    /// Whether a create or update call was made and succeeded
    pub fn wrote(&self) -> bool {
        matches!(
            self,
            DomainOutcome::Created { .. } | DomainOutcome::Updated { .. }
        )
    }

    /// Status recorded on the domain
    pub fn status(&self) -> UpdateStatus {
        if self.is_success() {
            UpdateStatus::Success
        } else {
            UpdateStatus::Failed
        }
    }
}

impl fmt::Display for DomainOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainOutcome::Unchanged { value } => write!(f, "no change ({})", value),
            DomainOutcome::Created { value, record_id } => {
                write!(f, "created {} (record {})", value, record_id)
            }
            DomainOutcome::Updated { value, previous } => {
                write!(f, "updated {} -> {}", previous, value)
            }
            DomainOutcome::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// One domain's line in a pass report
#[derive(Debug)]
pub struct DomainReport {
    /// Full domain name
    pub domain: String,
    /// What happened
    pub outcome: DomainOutcome,
}

/// How a pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassStatus {
    /// Domains were reconciled against the provider
    Completed,
    /// No domain tracks this family
    NoDomains,
    /// Discovery returned no usable address
    NoAddress,
    /// The cache already holds this address
    Cached,
}

/// Result of one reconciliation pass for one family
#[derive(Debug)]
pub struct PassReport {
    /// Family of the pass
    pub family: AddressFamily,
    /// Address the pass reconciled towards
    pub ip: Option<IpAddr>,
    /// How the pass ended
    pub status: PassStatus,
    /// Per-domain outcomes, in configuration order
    pub domains: Vec<DomainReport>,
    /// Whether the IP cache was advanced at the end of the pass
    pub cache_advanced: bool,
}

impl PassReport {
    /// Number of domains whose record now matches
    pub fn succeeded(&self) -> usize {
        self.domains.iter().filter(|d| d.outcome.is_success()).count()
    }

    /// Number of domains that failed
    pub fn failed(&self) -> usize {
        self.domains.len() - self.succeeded()
    }

    /// Number of create/update calls that succeeded
    pub fn writes(&self) -> usize {
        self.domains.iter().filter(|d| d.outcome.wrote()).count()
    }

    /// Outcome for a domain by full name
    pub fn outcome(&self, domain: &str) -> Option<&DomainOutcome> {
        self.domains
            .iter()
            .find(|d| d.domain == domain)
            .map(|d| &d.outcome)
    }
}

impl fmt::Display for PassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            PassStatus::Completed => write!(
                f,
                "{}: {} ok, {} failed",
                self.family,
                self.succeeded(),
                self.failed()
            ),
            PassStatus::NoDomains => write!(f, "{}: no domains", self.family),
            PassStatus::NoAddress => write!(f, "{}: no address", self.family),
            PassStatus::Cached => write!(f, "{}: unchanged", self.family),
        }
    }
}

/// Both passes of one cycle
#[derive(Debug)]
pub struct CycleReport {
    pub ipv4: PassReport,
    pub ipv6: PassReport,
}

impl CycleReport {
    /// Report for one family
    pub fn pass(&self, family: AddressFamily) -> &PassReport {
        match family {
            AddressFamily::V4 => &self.ipv4,
            AddressFamily::V6 => &self.ipv6,
        }
    }

    /// Failed domains across both passes
    pub fn failed(&self) -> usize {
        self.ipv4.failed() + self.ipv6.failed()
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}; {}", self.ipv4, self.ipv6)
    }
}
