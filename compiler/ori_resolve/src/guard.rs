//! Recursion guard for self-referential resolution chains.
//!
//! Each thread has its own stack of in-flight keys, so concurrent
//! resolutions on different threads never see each other as recursion.
//!
//! # Caching after prevented recursion
//!
//! A result computed while recursion was prevented may be incomplete: the
//! prevented inner call returned a placeholder instead of a real answer.
//! Each prevention is recorded as a [`Prevention`]: the index of the frame
//! it hit and its sequence number on this thread. Frames nested deeper than
//! that index are inside the cycle and must not be cached; the frame at the
//! index itself is the cycle root and may be.
//!
//! A [`StackStamp`] records the stack depth and the prevention sequence
//! before a computation starts. After it finishes,
//! [`RecursionGuard::may_cache`] refuses caching only if a prevention
//! recorded *since the stamp* hit a frame below that depth. A cycle that
//! closed before the computation started does not affect it.

use crate::query::QueryId;
use dashmap::DashMap;
use rustc_hash::FxBuildHasher;
use smallvec::SmallVec;
use std::thread::{self, ThreadId};

/// Minimum stack space to keep available (100KB red zone).
#[cfg(not(target_arch = "wasm32"))]
const RED_ZONE: usize = 100 * 1024;

/// Stack space to allocate when growing (1MB).
#[cfg(not(target_arch = "wasm32"))]
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Run `f`, growing the stack first if less than the red zone remains.
///
/// Resolvers re-enter the cache, so resolution chains nest as deeply as the
/// references they follow.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

/// WASM version - just call directly (WASM has its own stack management).
#[inline]
#[cfg(target_arch = "wasm32")]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}

/// In-flight computation key: (query identity, incomplete code, poly).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct GuardKey {
    query: QueryId,
    incomplete_code: bool,
    poly: bool,
}

impl GuardKey {
    pub(crate) fn new(query: QueryId, incomplete_code: bool, poly: bool) -> Self {
        GuardKey {
            query,
            incomplete_code,
            poly,
        }
    }
}

/// A prevented re-entry: which frame it hit, and when.
#[derive(Copy, Clone, Debug)]
struct Prevention {
    seq: u64,
    frame: usize,
}

#[derive(Default)]
struct ThreadStack {
    frames: SmallVec<[GuardKey; 8]>,
    /// Preventions whose target frame is still on the stack.
    preventions: SmallVec<[Prevention; 4]>,
    /// Number of preventions recorded on this thread so far.
    next_seq: u64,
}

impl ThreadStack {
    fn is_idle(&self) -> bool {
        self.frames.is_empty() && self.preventions.is_empty()
    }
}

/// Stack depth and prevention sequence taken before a computation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct StackStamp {
    depth: usize,
    seq: u64,
}

/// Per-thread recursion guard owned by one cache instance.
pub(crate) struct RecursionGuard {
    stacks: DashMap<ThreadId, ThreadStack, FxBuildHasher>,
}

impl RecursionGuard {
    pub(crate) fn new() -> Self {
        RecursionGuard {
            stacks: DashMap::with_hasher(FxBuildHasher),
        }
    }

    /// Snapshot the current thread's stack depth and prevention sequence.
    pub(crate) fn mark_stack(&self) -> StackStamp {
        self.stacks
            .get(&thread::current().id())
            .map_or(StackStamp { depth: 0, seq: 0 }, |stack| StackStamp {
                depth: stack.frames.len(),
                seq: stack.next_seq,
            })
    }

    /// Whether a computation marked with `stamp` may be cached now.
    pub(crate) fn may_cache(&self, stamp: StackStamp) -> bool {
        let cut_short = self.stacks.get(&thread::current().id()).is_some_and(|stack| {
            stack
                .preventions
                .iter()
                .any(|prevention| prevention.seq >= stamp.seq && prevention.frame < stamp.depth)
        });
        !cut_short
    }

    /// Run `compute` with `key` pushed on this thread's stack.
    ///
    /// Returns `None` without running `compute` if `key` is already in
    /// flight on this thread. The key is popped on every exit path,
    /// including unwinding.
    pub(crate) fn prevent_recursion<R>(&self, key: GuardKey, compute: impl FnOnce() -> R) -> Option<R> {
        let thread = thread::current().id();
        {
            let mut stack = self.stacks.entry(thread).or_default();
            if let Some(frame) = stack.frames.iter().position(|frame| *frame == key) {
                let seq = stack.next_seq;
                stack.next_seq += 1;
                stack.preventions.push(Prevention { seq, frame });
                return None;
            }
            stack.frames.push(key);
        }
        // The shard lock is released before `compute` may re-enter the guard.
        let _frame = Frame {
            guard: self,
            thread,
        };
        Some(compute())
    }

    /// Whether the current thread has `key` in flight.
    #[cfg(test)]
    pub(crate) fn is_in_flight(&self, key: GuardKey) -> bool {
        self.stacks
            .get(&thread::current().id())
            .is_some_and(|stack| stack.frames.contains(&key))
    }

    /// Number of threads with guard state.
    #[cfg(test)]
    pub(crate) fn active_threads(&self) -> usize {
        self.stacks.len()
    }

    fn pop(&self, thread: ThreadId) {
        let idle = match self.stacks.get_mut(&thread) {
            Some(mut stack) => {
                stack.frames.pop();
                // A prevention targeting the popped frame can no longer
                // affect any computation still running on this thread.
                let depth = stack.frames.len();
                stack.preventions.retain(|prevention| prevention.frame < depth);
                stack.is_idle()
            }
            None => false,
        };
        if idle {
            self.stacks.remove_if(&thread, |_, stack| stack.is_idle());
        }
    }
}

/// Pops its frame when dropped.
struct Frame<'a> {
    guard: &'a RecursionGuard,
    thread: ThreadId,
}

impl Drop for Frame<'_> {
    fn drop(&mut self) {
        self.guard.pop(self.thread);
    }
}

#[cfg(test)]
mod tests;
