//! Partition keys and the concurrent map behind each partition.

use crate::config::CacheConfig;
use crate::entry::{Entry, EntryKind, Slot};
use crate::query::QueryId;
use crate::shape::Resolved;
use dashmap::DashMap;
use rustc_hash::FxBuildHasher;
use std::sync::Arc;

/// Selects one of the eight partitions.
///
/// Entries never cross partitions: a result cached under one flag
/// combination is invisible to lookups under any other.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PartitionKey {
    /// Query belongs to a durable (physical) snapshot.
    pub physical: bool,
    /// Resolution tolerates syntactically incomplete input.
    pub incomplete_code: bool,
    /// Result is a candidate list rather than a single optional element.
    pub poly: bool,
}

impl PartitionKey {
    /// Number of partitions (2 × 2 × 2).
    pub const COUNT: usize = 8;

    #[inline]
    pub const fn new(physical: bool, incomplete_code: bool, poly: bool) -> Self {
        PartitionKey {
            physical,
            incomplete_code,
            poly,
        }
    }

    /// Slot in the partition array. Physical partitions occupy `0..4`.
    #[inline]
    pub const fn index(self) -> usize {
        (if self.physical { 0 } else { 4 })
            + (if self.incomplete_code { 0 } else { 2 })
            + (if self.poly { 0 } else { 1 })
    }

    /// All eight keys in index order.
    pub fn all() -> impl Iterator<Item = PartitionKey> {
        [true, false].into_iter().flat_map(|physical| {
            [true, false].into_iter().flat_map(move |incomplete_code| {
                [true, false]
                    .into_iter()
                    .map(move |poly| PartitionKey::new(physical, incomplete_code, poly))
            })
        })
    }
}

/// Concurrent map from query identity to entry.
pub(crate) struct Partition<Q, T> {
    map: DashMap<QueryId, Entry<Q, T>, FxBuildHasher>,
}

impl<Q, T> Partition<Q, T> {
    pub(crate) fn new(config: &CacheConfig) -> Self {
        Partition {
            map: DashMap::with_capacity_and_hasher_and_shard_amount(
                config.initial_capacity(),
                FxBuildHasher,
                config.shard_amount(),
            ),
        }
    }

    /// Live result for `id`, touching it with `tick`.
    ///
    /// An entry whose query was dropped reads as absent and is pruned.
    pub(crate) fn get(&self, id: QueryId, tick: u64) -> Option<Resolved<T>> {
        let found = self.map.get(&id).map(|entry| {
            if entry.is_live() {
                entry.slot.touch(tick);
                Some(entry.slot.resolved())
            } else {
                None
            }
        });
        // The read guard is released here; pruning needs the shard's write lock.
        match found {
            Some(Some(resolved)) => Some(resolved),
            Some(None) => {
                self.map.remove_if(&id, |_, entry| !entry.is_live());
                None
            }
            None => None,
        }
    }

    pub(crate) fn contains_live(&self, id: QueryId) -> bool {
        self.map.get(&id).is_some_and(|entry| entry.is_live())
    }

    pub(crate) fn kind(&self, id: QueryId) -> Option<EntryKind> {
        self.map
            .get(&id)
            .filter(|entry| entry.is_live())
            .map(|entry| entry.slot.kind())
    }

    /// Store `resolved` for `query` unless the live entry already holds it.
    ///
    /// Returns `false` if the write was skipped.
    pub(crate) fn store(
        &self,
        id: QueryId,
        query: &Arc<Q>,
        resolved: Resolved<T>,
        poly: bool,
        tick: u64,
    ) -> bool {
        let unchanged = self
            .map
            .get(&id)
            .is_some_and(|entry| entry.is_live() && entry.slot.holds(&resolved));
        if unchanged {
            return false;
        }
        let slot = Slot::new(resolved, poly, tick);
        self.map.insert(id, Entry::new(Arc::downgrade(query), slot));
        true
    }

    /// Remove the entry for `id` if it still holds `resolved`.
    pub(crate) fn retract(&self, id: QueryId, resolved: &Resolved<T>) -> bool {
        self.map
            .remove_if(&id, |_, entry| entry.slot.holds(resolved))
            .is_some()
    }

    pub(crate) fn clear(&self) {
        self.map.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    /// Drop entries whose query is gone. Returns the number removed.
    pub(crate) fn prune_dead(&self) -> usize {
        let before = self.map.len();
        self.map.retain(|_, entry| entry.is_live());
        before.saturating_sub(self.map.len())
    }

    /// Drop every reclaimable value and every dead entry. Sentinels with a
    /// live query stay. Returns the number removed.
    pub(crate) fn reclaim_all(&self) -> usize {
        let before = self.map.len();
        self.map
            .retain(|_, entry| entry.is_live() && !entry.slot.is_reclaimable());
        before.saturating_sub(self.map.len())
    }

    /// Number of entries holding a reclaimable value. Sentinels don't count.
    pub(crate) fn value_count(&self) -> usize {
        self.map
            .iter()
            .filter(|entry| entry.slot.is_reclaimable())
            .count()
    }

    /// Drop the `count` least recently used reclaimable values, never the
    /// entry for `keep`.
    pub(crate) fn reclaim_lru(&self, count: usize, keep: QueryId) -> usize {
        if count == 0 {
            return 0;
        }
        let mut candidates: Vec<(u64, QueryId)> = self
            .map
            .iter()
            .filter(|entry| *entry.key() != keep)
            .filter_map(|entry| entry.slot.last_used().map(|tick| (tick, *entry.key())))
            .collect();
        candidates.sort_unstable_by_key(|&(tick, _)| tick);

        candidates
            .into_iter()
            .take(count)
            .filter(|&(tick, id)| {
                // Skip entries that were hit or replaced since the scan.
                self.map
                    .remove_if(&id, |_, entry| entry.slot.last_used() == Some(tick))
                    .is_some()
            })
            .count()
    }
}

#[cfg(test)]
mod tests;
