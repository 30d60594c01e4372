// # IP Cache
//
// Last successfully applied address per address family.
//
// ## Contract
//
// - Constructed empty once at startup and handed to the engine by `Arc`
// - Read once at the start of a pass ([`IpCache::snapshot`])
// - Written at most once at the end of a pass ([`IpCache::advance`] or
//   [`IpCache::record_hit`]), never mid-pass
// - Advanced only after the provider confirmed the remote record matches
//
// ## Force Compare
//
// A cache hit lets the engine skip a pass entirely. After
// `force_compare_cycles` consecutive hits the next pass is forced to
// re-check the provider anyway, so records edited out-of-band are repaired.

use chrono::{DateTime, Utc};
use std::net::IpAddr;
use tokio::sync::RwLock;

use crate::traits::AddressFamily;

/// Point-in-time view of one family's cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheEntry {
    /// Last applied address (`None` = never applied)
    pub addr: Option<IpAddr>,
    /// When the address was last applied
    pub applied_at: Option<DateTime<Utc>>,
    /// Cache hits left before a pass is forced to re-check the provider
    pub remaining_hits: u32,
}

impl CacheEntry {
    /// Check whether a pass for `ip` can be skipped
    pub fn is_fresh(&self, ip: IpAddr) -> bool {
        self.addr == Some(ip) && self.remaining_hits > 0
    }
}

/// Cache for one address family
#[derive(Debug)]
pub struct IpCache {
    family: AddressFamily,
    force_compare_cycles: u32,
    inner: RwLock<CacheEntry>,
}

impl IpCache {
    /// Create an empty cache
    pub fn new(family: AddressFamily, force_compare_cycles: u32) -> Self {
        Self {
            family,
            force_compare_cycles,
            inner: RwLock::new(CacheEntry::default()),
        }
    }

    /// Family this cache tracks
    pub fn family(&self) -> AddressFamily {
        self.family
    }

    /// Read the current entry
    pub async fn snapshot(&self) -> CacheEntry {
        *self.inner.read().await
    }

    /// Last applied address
    pub async fn addr(&self) -> Option<IpAddr> {
        self.inner.read().await.addr
    }

    /// Consume one cache hit after a skipped pass
    pub async fn record_hit(&self) {
        let mut guard = self.inner.write().await;
        guard.remaining_hits = guard.remaining_hits.saturating_sub(1);
    }

    /// Store `ip` as applied
    ///
    /// With `complete == false` (some domains failed) the address is still
    /// recorded, but the next pass re-checks the provider so the failed
    /// domains are retried on the next cycle.
    pub async fn advance(&self, ip: IpAddr, complete: bool) {
        let mut guard = self.inner.write().await;
        guard.addr = Some(ip);
        guard.applied_at = Some(Utc::now());
        guard.remaining_hits = if complete { self.force_compare_cycles } else { 0 };
    }
}

/// The IPv4 and IPv6 caches, shared by every engine in the process
#[derive(Debug)]
pub struct IpCaches {
    v4: IpCache,
    v6: IpCache,
}

impl IpCaches {
    /// Create both caches empty
    pub fn new(force_compare_cycles: u32) -> Self {
        Self {
            v4: IpCache::new(AddressFamily::V4, force_compare_cycles),
            v6: IpCache::new(AddressFamily::V6, force_compare_cycles),
        }
    }

    /// Cache for `family`
    pub fn get(&self, family: AddressFamily) -> &IpCache {
        match family {
            AddressFamily::V4 => &self.v4,
            AddressFamily::V6 => &self.v6,
        }
    }
}

impl Default for IpCaches {
    fn default() -> Self {
        Self::new(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_starts_empty() {
        let caches = IpCaches::default();
        let entry = tokio_test::block_on(caches.get(AddressFamily::V4).snapshot());
        assert_eq!(entry.addr, None);
        assert!(entry.applied_at.is_none());
        assert!(!entry.is_fresh(ip("203.0.113.5")));
    }

    #[tokio::test]
    async fn test_advance_then_hits_run_out() {
        let cache = IpCache::new(AddressFamily::V4, 2);
        cache.advance(ip("203.0.113.5"), true).await;

        let entry = cache.snapshot().await;
        assert!(entry.is_fresh(ip("203.0.113.5")));
        assert!(!entry.is_fresh(ip("203.0.113.9")));
        assert!(entry.applied_at.is_some());

        cache.record_hit().await;
        assert!(cache.snapshot().await.is_fresh(ip("203.0.113.5")));

        cache.record_hit().await;
        assert!(!cache.snapshot().await.is_fresh(ip("203.0.113.5")));

        // Saturates at zero
        cache.record_hit().await;
        assert_eq!(cache.snapshot().await.remaining_hits, 0);
    }

    #[tokio::test]
    async fn test_incomplete_advance_forces_recheck() {
        let cache = IpCache::new(AddressFamily::V6, 5);
        cache.advance(ip("2001:db8::1"), false).await;

        assert_eq!(cache.addr().await, Some(ip("2001:db8::1")));
        assert!(!cache.snapshot().await.is_fresh(ip("2001:db8::1")));
    }

    #[tokio::test]
    async fn test_families_are_independent() {
        let caches = IpCaches::new(5);
        caches.get(AddressFamily::V4).advance(ip("203.0.113.5"), true).await;

        assert_eq!(caches.get(AddressFamily::V6).addr().await, None);
        assert_eq!(caches.get(AddressFamily::V6).family(), AddressFamily::V6);
    }
}
