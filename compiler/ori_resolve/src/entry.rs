//! Cache entries: sentinels and reclaimable value wrappers.

use crate::shape::Resolved;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;

/// Observable shape of a cache entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Mono resolution ran and produced nothing.
    NullSentinel,
    /// Poly resolution ran and produced no candidates.
    EmptySentinel,
    /// A live result held in a reclaimable wrapper.
    Value,
}

/// A result the cache may drop under memory pressure.
pub(crate) struct Reclaimable<T> {
    value: Resolved<T>,
    /// Cache tick of the last hit, used to pick reclamation victims.
    last_used: AtomicU64,
}

impl<T> Reclaimable<T> {
    fn new(value: Resolved<T>, tick: u64) -> Self {
        Reclaimable {
            value,
            last_used: AtomicU64::new(tick),
        }
    }

    #[inline]
    fn touch(&self, tick: u64) {
        self.last_used.fetch_max(tick, Ordering::Relaxed);
    }

    #[inline]
    fn last_used(&self) -> u64 {
        self.last_used.load(Ordering::Relaxed)
    }
}

/// Stored result. Sentinels are unit variants: they allocate nothing and are
/// never reclaimed.
pub(crate) enum Slot<T> {
    Null,
    Empty,
    Value(Reclaimable<T>),
}

impl<T> Slot<T> {
    /// Pick the cheapest slot for `resolved`.
    pub(crate) fn new(resolved: Resolved<T>, poly: bool, tick: u64) -> Self {
        match resolved {
            Resolved::Nothing if poly => Slot::Empty,
            Resolved::Nothing => Slot::Null,
            value => Slot::Value(Reclaimable::new(value, tick)),
        }
    }

    pub(crate) fn kind(&self) -> EntryKind {
        match self {
            Slot::Null => EntryKind::NullSentinel,
            Slot::Empty => EntryKind::EmptySentinel,
            Slot::Value(_) => EntryKind::Value,
        }
    }

    pub(crate) fn resolved(&self) -> Resolved<T> {
        match self {
            Slot::Null | Slot::Empty => Resolved::Nothing,
            Slot::Value(cell) => cell.value.clone(),
        }
    }

    /// Whether storing `resolved` would not change this slot.
    pub(crate) fn holds(&self, resolved: &Resolved<T>) -> bool {
        match self {
            Slot::Null | Slot::Empty => resolved.is_nothing(),
            Slot::Value(cell) => cell.value.same_as(resolved),
        }
    }

    pub(crate) fn is_reclaimable(&self) -> bool {
        matches!(self, Slot::Value(_))
    }

    /// Last-use tick, or `None` for sentinels.
    pub(crate) fn last_used(&self) -> Option<u64> {
        match self {
            Slot::Value(cell) => Some(cell.last_used()),
            Slot::Null | Slot::Empty => None,
        }
    }

    pub(crate) fn touch(&self, tick: u64) {
        if let Slot::Value(cell) = self {
            cell.touch(tick);
        }
    }
}

/// Partition map value: the weak query back-reference plus its slot.
pub(crate) struct Entry<Q, T> {
    query: Weak<Q>,
    pub(crate) slot: Slot<T>,
}

impl<Q, T> Entry<Q, T> {
    pub(crate) fn new(query: Weak<Q>, slot: Slot<T>) -> Self {
        Entry { query, slot }
    }

    /// Whether the query this entry belongs to is still reachable.
    #[inline]
    pub(crate) fn is_live(&self) -> bool {
        self.query.strong_count() > 0
    }
}
