//! Query and element contracts consumed by the cache.

use std::sync::Arc;

/// A reference-like object that can be resolved.
///
/// Queries are shared as `Arc<Q>`; the cache keys entries by the allocation
/// and only ever holds a `Weak<Q>`, so it never extends a query's lifetime.
pub trait Query: Send + Sync {
    /// Whether the query belongs to a durable (physical) snapshot rather than
    /// a transient in-memory copy. Selects the partition family that
    /// transient-only mutations leave untouched.
    fn is_physical(&self) -> bool;
}

/// An element produced by resolution.
pub trait Element: Send + Sync {
    /// Whether the element is still valid.
    ///
    /// A resolver must never return an invalidated element; the cache logs
    /// such results and refuses to memoize them.
    fn is_valid(&self) -> bool {
        true
    }
}

/// Identity of a query allocation.
///
/// Address reuse cannot alias two queries: every entry holding a `QueryId`
/// also holds a `Weak` to the same allocation, which keeps the address
/// reserved until the entry is dropped.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct QueryId(usize);

impl QueryId {
    #[inline]
    pub(crate) fn of<Q>(query: &Arc<Q>) -> Self {
        QueryId(Arc::as_ptr(query) as usize)
    }
}
