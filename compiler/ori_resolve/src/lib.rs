//! Resolution cache for the Ori compiler.
//!
//! Memoizes expensive "resolve" computations that map a reference-like query
//! to its target. Results are kept in eight independent partitions selected by
//! three flags:
//!
//! - **physical**: whether the query belongs to a durable snapshot
//! - **incomplete code**: whether resolution tolerates incomplete input
//! - **poly**: whether the result is one optional value or a candidate list
//!
//! # Ownership
//!
//! The cache never keeps a query alive. Queries are shared as `Arc<Q>` and
//! each entry holds a `Weak<Q>` back-reference; once the last strong handle
//! is dropped the entry reads as absent and is pruned. Values live in
//! reclaimable wrappers that [`ResolveCache::reclaim`] (or the configured soft
//! limit) may drop at any time. Empty results are stored as sentinels, which
//! cost nothing and are never reclaimed.
//!
//! # Invalidation
//!
//! The cache subscribes to a [`MutationBus`] at construction. Every "before
//! change" event bumps an invalidation counter and clears the affected
//! partitions. A result whose computation overlapped such an event is
//! returned to the caller but not memoized.
//!
//! # Usage
//!
//! ```text
//! let bus = MutationBus::new();
//! let cache: ResolveCache<Reference, Decl> = ResolveCache::new(&bus);
//!
//! let target = cache.resolve_with_caching::<Mono, ResolveError, _>(
//!     &reference,
//!     |reference, incomplete| resolve_reference(reference, incomplete),
//!     true,
//!     false,
//! )?;
//! ```

mod bus;
mod cache;
mod cancel;
mod config;
mod entry;
mod error;
mod guard;
mod partition;
mod query;
mod shape;
mod stats;

pub use bus::{MutationBus, MutationListener};
pub use cache::ResolveCache;
pub use cancel::CancelToken;
pub use config::CacheConfig;
pub use entry::EntryKind;
pub use error::{Cancelled, ConfigError};
pub use partition::PartitionKey;
pub use query::{Element, Query};
pub use shape::{Mono, Poly, Resolved, Shape};
pub use stats::CacheStats;

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Call this once at startup. Safe to call multiple times.
/// Enable with `RUST_LOG=ori_resolve=debug` or `RUST_LOG=ori_resolve=trace`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            // A host application may already own the global subscriber.
            let _ = tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .try_init();
        }
    });
}
