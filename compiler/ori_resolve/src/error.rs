//! Error types for the resolution cache.

use thiserror::Error;

/// Resolution was abandoned because its [`CancelToken`](crate::CancelToken)
/// was triggered before any work started.
///
/// Resolver error types opt into cancellation with `From<Cancelled>`, so the
/// cache can report it through the caller's own error type.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Error)]
#[error("resolution cancelled")]
pub struct Cancelled;

/// Invalid [`CacheConfig`](crate::CacheConfig) value.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Partition maps are sharded by hash bits, so the shard amount must be
    /// a power of two greater than one.
    #[error("shard amount must be a power of two greater than 1, got {0}")]
    InvalidShardAmount(usize),

    /// A soft limit of zero would reclaim every value on insert.
    #[error("soft limit must be greater than 0")]
    ZeroSoftLimit,
}
