//! Cache statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time counters for a [`ResolveCache`](crate::ResolveCache).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from a live entry.
    pub hits: u64,
    /// Lookups that found no live entry.
    pub misses: u64,
    /// Results not cached because an invalidation overlapped them.
    pub stale: u64,
    /// Calls short-circuited by the recursion guard.
    pub recursion_prevented: u64,
    /// Invalidation events observed.
    pub invalidations: u64,
    /// Entries dropped by reclamation passes.
    pub reclaimed: u64,
}

// Relaxed: counters are diagnostics only and never order other memory.
#[derive(Default)]
pub(crate) struct StatCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    stale: AtomicU64,
    recursion_prevented: AtomicU64,
    invalidations: AtomicU64,
    reclaimed: AtomicU64,
}

impl StatCounters {
    pub(crate) fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn stale(&self) {
        self.stale.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn recursion_prevented(&self) {
        self.recursion_prevented.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reclaimed(&self, count: usize) {
        self.reclaimed
            .fetch_add(u64::try_from(count).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            recursion_prevented: self.recursion_prevented.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            reclaimed: self.reclaimed.load(Ordering::Relaxed),
        }
    }
}
