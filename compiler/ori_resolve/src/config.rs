//! Cache construction options.

use crate::cancel::CancelToken;
use crate::error::ConfigError;
use std::num::NonZeroUsize;

/// Initial capacity of every partition map.
const DEFAULT_INITIAL_CAPACITY: usize = 100;

/// Lower bound for the default shard amount.
const MIN_SHARDS: usize = 4;

/// Options for [`ResolveCache`](crate::ResolveCache).
///
/// # Example
///
/// ```text
/// let config = CacheConfig::default()
///     .with_shard_amount(16)?
///     .with_soft_limit(50_000)?
///     .with_cancel_token(daemon.cancel_token());
/// let cache = ResolveCache::with_config(&bus, config);
/// ```
#[derive(Clone, Debug)]
pub struct CacheConfig {
    shard_amount: usize,
    initial_capacity: usize,
    soft_limit: Option<usize>,
    cancel: CancelToken,
}

impl CacheConfig {
    /// Set the number of lock shards per partition map.
    pub fn with_shard_amount(mut self, shard_amount: usize) -> Result<Self, ConfigError> {
        if shard_amount < 2 || !shard_amount.is_power_of_two() {
            return Err(ConfigError::InvalidShardAmount(shard_amount));
        }
        self.shard_amount = shard_amount;
        Ok(self)
    }

    /// Set the initial capacity of every partition map.
    #[must_use]
    pub fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    /// Reclaim values from a partition once it holds more than `limit` entries.
    ///
    /// Without a soft limit, values are only dropped by explicit
    /// [`reclaim`](crate::ResolveCache::reclaim) passes and invalidation.
    pub fn with_soft_limit(mut self, limit: usize) -> Result<Self, ConfigError> {
        if limit == 0 {
            return Err(ConfigError::ZeroSoftLimit);
        }
        self.soft_limit = Some(limit);
        Ok(self)
    }

    /// Use `cancel` for the entry-point cancellation check.
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn shard_amount(&self) -> usize {
        self.shard_amount
    }

    pub fn initial_capacity(&self) -> usize {
        self.initial_capacity
    }

    pub fn soft_limit(&self) -> Option<usize> {
        self.soft_limit
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        // One shard per core, like a concurrency level sized to the machine.
        let cores = std::thread::available_parallelism().map_or(MIN_SHARDS, NonZeroUsize::get);
        Self {
            shard_amount: cores.max(MIN_SHARDS).next_power_of_two(),
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            soft_limit: None,
            cancel: CancelToken::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_shard_amount_is_power_of_two() {
        let config = CacheConfig::default();
        assert!(config.shard_amount().is_power_of_two());
        assert!(config.shard_amount() >= MIN_SHARDS);
        assert_eq!(config.initial_capacity(), DEFAULT_INITIAL_CAPACITY);
        assert_eq!(config.soft_limit(), None);
    }

    #[test]
    fn test_rejects_invalid_shard_amount() {
        for bad in [0, 1, 3, 12] {
            assert_eq!(
                CacheConfig::default().with_shard_amount(bad).err(),
                Some(ConfigError::InvalidShardAmount(bad))
            );
        }
        assert!(CacheConfig::default().with_shard_amount(8).is_ok());
    }

    #[test]
    fn test_rejects_zero_soft_limit() {
        assert_eq!(
            CacheConfig::default().with_soft_limit(0).err(),
            Some(ConfigError::ZeroSoftLimit)
        );
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let config = CacheConfig::default().with_cancel_token(token.clone());
        token.cancel();
        assert!(config.cancel_token().is_cancelled());
    }
}
