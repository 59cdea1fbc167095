//! Cooperative cancellation for cache lookups.

use crate::error::Cancelled;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag checked at the cache entry point.
///
/// Clones observe the same flag. A cancelled token stays cancelled until
/// [`reset`](Self::reset) is called, so every resolution started in the
/// meantime fails fast without invoking its resolver. Resolvers that are
/// already running must observe cancellation themselves.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token in the "not cancelled" state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Clear a previous cancellation request.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Return `Err(Cancelled)` if cancellation was requested.
    #[inline]
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}
