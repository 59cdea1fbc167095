//! Mutation event bus.
//!
//! Producers announce structural mutations before and after they happen;
//! listeners such as [`ResolveCache`](crate::ResolveCache) react to them.
//! The bus holds listeners weakly, so subscribing never extends a
//! listener's lifetime and no unsubscribe call is needed.

use parking_lot::RwLock;
use std::sync::{Arc, Weak};

/// Receives mutation notifications.
pub trait MutationListener: Send + Sync {
    /// A mutation is about to happen. `physical` is true when durable
    /// (physical) state changes, false for transient-only changes.
    fn before_change(&self, physical: bool);

    /// A mutation has completed.
    fn after_change(&self, _physical: bool) {}
}

/// Subscribe/notify hub for mutation events.
#[derive(Default)]
pub struct MutationBus {
    listeners: RwLock<Vec<Weak<dyn MutationListener>>>,
}

impl MutationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` until it is dropped.
    pub fn subscribe(&self, listener: Weak<dyn MutationListener>) {
        self.listeners.write().push(listener);
    }

    /// Announce an upcoming mutation.
    pub fn before_change(&self, physical: bool) {
        tracing::trace!(physical, "before mutation");
        self.dispatch(|listener| listener.before_change(physical));
    }

    /// Announce a completed mutation.
    pub fn after_change(&self, physical: bool) {
        tracing::trace!(physical, "after mutation");
        self.dispatch(|listener| listener.after_change(physical));
    }

    /// Run `mutation` bracketed by before/after notifications.
    pub fn mutate<R>(&self, physical: bool, mutation: impl FnOnce() -> R) -> R {
        self.before_change(physical);
        let result = mutation();
        self.after_change(physical);
        result
    }

    /// Number of listeners that are still alive.
    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .iter()
            .filter(|listener| listener.strong_count() > 0)
            .count()
    }

    fn dispatch(&self, notify: impl Fn(&dyn MutationListener)) {
        // Upgrade under the read lock, notify outside it: listeners may
        // subscribe or trigger further events while handling this one.
        let (live, any_dead) = {
            let listeners = self.listeners.read();
            let live: Vec<Arc<dyn MutationListener>> =
                listeners.iter().filter_map(Weak::upgrade).collect();
            let any_dead = live.len() != listeners.len();
            (live, any_dead)
        };
        if any_dead {
            self.listeners
                .write()
                .retain(|listener| listener.strong_count() > 0);
        }
        for listener in &live {
            notify(listener.as_ref());
        }
    }
}
