//! The resolution cache.
//!
//! # Lookup protocol
//!
//! 1. Fail fast if the cancel token is set.
//! 2. Read the invalidation counter (`start_stamp`) and pick the partition.
//! 3. Return a live entry if there is one.
//! 4. Otherwise run the resolver, under the recursion guard if requested.
//! 5. Cache the result only if it is valid, no prevented recursion taints
//!    it, and the counter still equals `start_stamp`.
//!
//! The counter comparison is coarse: it tells whether *any* invalidation was
//! observed during the window, not whether the state the resolver read
//! actually changed. A mutation that is later reverted still discards the
//! result.

use crate::bus::{MutationBus, MutationListener};
use crate::config::CacheConfig;
use crate::entry::EntryKind;
use crate::error::Cancelled;
use crate::guard::{ensure_sufficient_stack, GuardKey, RecursionGuard};
use crate::partition::{Partition, PartitionKey};
use crate::query::{Element, Query, QueryId};
use crate::shape::{Resolved, Shape};
use crate::stats::{CacheStats, StatCounters};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Concurrent, partitioned memoization cache for resolve computations.
///
/// `Q` is the query type, `T` the element type results are made of. The
/// cache is a cheap handle: clones share the same partitions, counter and
/// recursion guard. Create one per owning context and pass it explicitly.
///
/// # Thread Safety
///
/// Lookups never take a global lock. Each partition is a sharded map and
/// the invalidation counter is a single atomic. Two threads racing on the
/// same miss may both run the resolver; the later store wins, which is fine
/// because results for the same query and flags are interchangeable.
pub struct ResolveCache<Q, T> {
    shared: Arc<Shared<Q, T>>,
}

struct Shared<Q, T> {
    partitions: [Partition<Q, T>; PartitionKey::COUNT],
    /// Bumped once per observed invalidation.
    clear_count: AtomicU64,
    guard: RecursionGuard,
    stats: StatCounters,
    /// Logical clock for last-use tracking.
    tick: AtomicU64,
    /// Shared empty candidate list handed out for every empty poly result.
    empty: Arc<[T]>,
    config: CacheConfig,
}

impl<Q, T> Shared<Q, T> {
    #[inline]
    fn partition(&self, key: PartitionKey) -> &Partition<Q, T> {
        &self.partitions[key.index()]
    }

    #[inline]
    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    fn clear_count(&self) -> u64 {
        self.clear_count.load(Ordering::SeqCst)
    }

    fn clear(&self, physical: bool) {
        // Bump before clearing: a store that read the old count is rejected
        // either by its own recheck or by the clear that follows.
        self.clear_count.fetch_add(1, Ordering::SeqCst);
        for key in PartitionKey::all().filter(|key| physical || !key.physical) {
            self.partition(key).clear();
        }
        self.stats.invalidation();
        tracing::debug!(physical, "resolve cache invalidated");
    }

    fn store(
        &self,
        key: PartitionKey,
        id: QueryId,
        query: &Arc<Q>,
        resolved: Resolved<T>,
        start_stamp: u64,
    ) {
        let partition = self.partition(key);
        let stored = resolved.clone();
        if !partition.store(id, query, resolved, key.poly, self.next_tick()) {
            return;
        }
        // An invalidation may have cleared the partition between our stamp
        // check and the insert.
        if self.clear_count() != start_stamp {
            if partition.retract(id, &stored) {
                self.stats.stale();
                tracing::debug!(?key, "stale result retracted");
            }
            return;
        }
        self.enforce_soft_limit(key, id);
    }

    /// Keep the number of reclaimable values in partition `key` within the
    /// soft limit. Sentinels are never reclaimed, so they don't count, and
    /// the value just stored for `stored` is never the one dropped.
    fn enforce_soft_limit(&self, key: PartitionKey, stored: QueryId) {
        let Some(limit) = self.config.soft_limit() else {
            return;
        };
        let partition = self.partition(key);
        if partition.len() <= limit {
            return;
        }
        let mut reclaimed = partition.prune_dead();
        let values = partition.value_count();
        if values > limit {
            reclaimed += partition.reclaim_lru(values / 2, stored);
        }
        if reclaimed > 0 {
            self.stats.reclaimed(reclaimed);
            tracing::debug!(?key, limit, reclaimed, "soft limit exceeded; values reclaimed");
        }
    }
}

impl<Q: Query, T: Element> MutationListener for Shared<Q, T> {
    fn before_change(&self, physical: bool) {
        self.clear(physical);
    }
}

impl<Q: Query + 'static, T: Element + 'static> ResolveCache<Q, T> {
    /// Create a cache with default options, subscribed to `bus`.
    pub fn new(bus: &MutationBus) -> Self {
        Self::with_config(bus, CacheConfig::default())
    }

    /// Create a cache subscribed to `bus`.
    ///
    /// The bus only holds a weak handle; the subscription ends when the last
    /// clone of the cache is dropped.
    pub fn with_config(bus: &MutationBus, config: CacheConfig) -> Self {
        let shared = Arc::new(Shared {
            partitions: std::array::from_fn(|_| Partition::new(&config)),
            clear_count: AtomicU64::new(0),
            guard: RecursionGuard::new(),
            stats: StatCounters::default(),
            tick: AtomicU64::new(0),
            empty: Arc::from(Vec::new()),
            config,
        });
        let listener: Weak<Shared<Q, T>> = Arc::downgrade(&shared);
        bus.subscribe(listener);
        ResolveCache { shared }
    }

    /// Resolve `query`, reusing a memoized result when one is live.
    ///
    /// `S` selects the result shape ([`Mono`](crate::Mono) or
    /// [`Poly`](crate::Poly)); together with `incomplete_code` and the
    /// query's physical flag it picks the partition.
    ///
    /// With `prevent_recursion`, a call for a (query, `incomplete_code`,
    /// shape) triple that is already being resolved on this thread returns
    /// the shape's "nothing" output (`None`, or an empty list) without
    /// running `resolver`.
    ///
    /// Resolver errors are returned unchanged and nothing is cached. A result
    /// whose computation overlapped an invalidation is returned but not
    /// cached.
    pub fn resolve_with_caching<S, E, F>(
        &self,
        query: &Arc<Q>,
        resolver: F,
        prevent_recursion: bool,
        incomplete_code: bool,
    ) -> Result<S::Output, E>
    where
        S: Shape<T>,
        E: From<Cancelled>,
        F: FnOnce(&Arc<Q>, bool) -> Result<S::Output, E>,
    {
        let shared = &*self.shared;
        shared.config.cancel_token().check()?;

        let start_stamp = shared.clear_count();
        let key = PartitionKey::new(query.is_physical(), incomplete_code, S::POLY);
        let id = QueryId::of(query);

        let hit = shared
            .partition(key)
            .get(id, shared.next_tick())
            .and_then(|resolved| S::from_resolved(resolved, &shared.empty));
        if let Some(output) = hit {
            shared.stats.hit();
            tracing::trace!(?key, "resolve cache hit");
            return Ok(output);
        }
        shared.stats.miss();
        tracing::trace!(?key, "resolve cache miss");

        let stamp = shared.guard.mark_stack();
        let compute = || ensure_sufficient_stack(|| resolver(query, incomplete_code));
        let output = if prevent_recursion {
            let guard_key = GuardKey::new(id, incomplete_code, S::POLY);
            match shared.guard.prevent_recursion(guard_key, compute) {
                Some(result) => result?,
                None => {
                    shared.stats.recursion_prevented();
                    tracing::debug!(?key, "recursive resolution prevented");
                    return Ok(S::nothing(&shared.empty));
                }
            }
        } else {
            compute()?
        };

        let resolved = S::to_resolved(&output);
        if !resolved.all_valid() {
            tracing::error!(?key, ?resolved, "resolver returned an invalid element; not cached");
        } else if !shared.guard.may_cache(stamp) {
            tracing::debug!(?key, "result depends on a prevented recursion; not cached");
        } else if shared.clear_count() != start_stamp {
            shared.stats.stale();
            tracing::debug!(?key, "stale result discarded");
        } else {
            shared.store(key, id, query, resolved, start_stamp);
        }
        Ok(output)
    }

    /// Whether a live entry for `query` exists in the given partition.
    pub fn is_cached(&self, query: &Arc<Q>, physical: bool, incomplete_code: bool, poly: bool) -> bool {
        self.shared
            .partition(PartitionKey::new(physical, incomplete_code, poly))
            .contains_live(QueryId::of(query))
    }

    /// Shape of the live entry for `query` in partition `key`, if any.
    pub fn entry_kind(&self, query: &Arc<Q>, key: PartitionKey) -> Option<EntryKind> {
        self.shared.partition(key).kind(QueryId::of(query))
    }

    /// Invalidate after a mutation.
    ///
    /// Always bumps the invalidation counter. A physical mutation clears all
    /// eight partitions; a transient one clears only the four non-physical
    /// partitions, since durable snapshots cannot observe it.
    pub fn clear_cache(&self, physical: bool) {
        self.shared.clear(physical);
    }

    /// Drop entries whose query is gone. Returns the number removed.
    pub fn prune_dead_keys(&self) -> usize {
        let pruned: usize = self
            .shared
            .partitions
            .iter()
            .map(Partition::prune_dead)
            .sum();
        self.shared.stats.reclaimed(pruned);
        tracing::debug!(pruned, "dead resolve cache keys pruned");
        pruned
    }

    /// Memory-pressure pass: drop every reclaimable value and every dead
    /// entry. Sentinels for live queries stay. Returns the number removed.
    pub fn reclaim(&self) -> usize {
        let reclaimed: usize = self
            .shared
            .partitions
            .iter()
            .map(Partition::reclaim_all)
            .sum();
        self.shared.stats.reclaimed(reclaimed);
        tracing::debug!(reclaimed, "resolve cache values reclaimed");
        reclaimed
    }

    /// Number of entries across all partitions, including dead ones that
    /// have not been pruned yet.
    pub fn len(&self) -> usize {
        self.shared.partitions.iter().map(Partition::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current value of the invalidation counter.
    pub fn invalidation_count(&self) -> u64 {
        self.shared.clear_count()
    }

    pub fn stats(&self) -> CacheStats {
        self.shared.stats.snapshot()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.shared.config
    }
}

impl<Q, T> Clone for ResolveCache<Q, T> {
    fn clone(&self) -> Self {
        ResolveCache {
            shared: Arc::clone(&self.shared),
        }
    }
}
