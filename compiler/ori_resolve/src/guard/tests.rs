use super::*;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

fn key(query: &Arc<&'static str>) -> GuardKey {
    GuardKey::new(QueryId::of(query), false, false)
}

#[test]
fn test_runs_and_pops() {
    let guard = RecursionGuard::new();
    let query = Arc::new("a");

    let result = guard.prevent_recursion(key(&query), || {
        assert!(guard.is_in_flight(key(&query)));
        7
    });

    assert_eq!(result, Some(7));
    assert!(!guard.is_in_flight(key(&query)));
    assert_eq!(guard.active_threads(), 0);
}

#[test]
fn test_reentry_is_prevented() {
    let guard = RecursionGuard::new();
    let query = Arc::new("a");

    let outer = guard.prevent_recursion(key(&query), || {
        guard.prevent_recursion(key(&query), || unreachable!("recursive call must not run"))
    });

    assert_eq!(outer, Some(None));
}

#[test]
fn test_flags_are_part_of_the_key() {
    let guard = RecursionGuard::new();
    let query = Arc::new("a");
    let id = QueryId::of(&query);

    let inner = guard.prevent_recursion(GuardKey::new(id, false, false), || {
        guard.prevent_recursion(GuardKey::new(id, true, false), || 1)
    });

    assert_eq!(inner, Some(Some(1)));
}

#[test]
fn test_frame_popped_on_panic() {
    let guard = RecursionGuard::new();
    let query = Arc::new("a");

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        guard.prevent_recursion(key(&query), || panic!("resolver failed"))
    }));

    assert!(outcome.is_err());
    assert!(!guard.is_in_flight(key(&query)));
    assert_eq!(guard.prevent_recursion(key(&query), || 3), Some(3));
}

#[test]
fn test_cycle_root_may_cache() {
    let guard = RecursionGuard::new();
    let a = Arc::new("a");

    let stamp = guard.mark_stack();
    guard.prevent_recursion(key(&a), || {
        assert_eq!(guard.prevent_recursion(key(&a), || ()), None);
    });

    assert!(guard.may_cache(stamp));
}

#[test]
fn test_frames_inside_cycle_may_not_cache() {
    let guard = RecursionGuard::new();
    let a = Arc::new("a");
    let b = Arc::new("b");

    let outer_stamp = guard.mark_stack();
    guard.prevent_recursion(key(&a), || {
        let inner_stamp = guard.mark_stack();
        guard.prevent_recursion(key(&b), || {
            // b -> a closes the cycle back to the outer frame.
            assert_eq!(guard.prevent_recursion(key(&a), || ()), None);
        });
        assert!(!guard.may_cache(inner_stamp));
    });

    assert!(guard.may_cache(outer_stamp));
    assert_eq!(guard.active_threads(), 0);
}

#[test]
fn test_threads_have_separate_stacks() {
    let guard = RecursionGuard::new();
    let query = Arc::new("shared");

    guard.prevent_recursion(key(&query), || {
        std::thread::scope(|scope| {
            let other = scope.spawn(|| guard.prevent_recursion(key(&query), || 5));
            assert_eq!(other.join().ok(), Some(Some(5)));
        });
    });
}

#[test]
fn test_closed_cycle_does_not_block_later_siblings() {
    let guard = RecursionGuard::new();
    let a = Arc::new("a");
    let b = Arc::new("b");
    let c = Arc::new("c");

    guard.prevent_recursion(key(&a), || {
        let b_stamp = guard.mark_stack();
        guard.prevent_recursion(key(&b), || {
            assert_eq!(guard.prevent_recursion(key(&a), || ()), None);
        });
        assert!(!guard.may_cache(b_stamp));

        // The a -> b -> a cycle closed before c started.
        let c_stamp = guard.mark_stack();
        guard.prevent_recursion(key(&c), || ());
        assert!(guard.may_cache(c_stamp));
    });

    assert_eq!(guard.active_threads(), 0);
}
