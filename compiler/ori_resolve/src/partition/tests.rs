use super::*;
use pretty_assertions::assert_eq;

fn partition() -> Partition<&'static str, u32> {
    let config = CacheConfig::default()
        .with_shard_amount(4)
        .unwrap_or_else(|e| panic!("{e}"));
    Partition::new(&config)
}

#[test]
fn test_index_layout() {
    assert_eq!(PartitionKey::new(true, true, true).index(), 0);
    assert_eq!(PartitionKey::new(true, true, false).index(), 1);
    assert_eq!(PartitionKey::new(true, false, true).index(), 2);
    assert_eq!(PartitionKey::new(false, true, true).index(), 4);
    assert_eq!(PartitionKey::new(false, false, false).index(), 7);
}

#[test]
fn test_all_keys_cover_every_index_once() {
    let indices: Vec<usize> = PartitionKey::all().map(PartitionKey::index).collect();
    assert_eq!(indices, (0..PartitionKey::COUNT).collect::<Vec<_>>());
}

#[test]
fn test_physical_partitions_come_first() {
    for key in PartitionKey::all() {
        assert_eq!(key.physical, key.index() < PartitionKey::COUNT / 2);
    }
}

#[test]
fn test_store_and_get() {
    let partition = partition();
    let query = Arc::new("a");
    let id = QueryId::of(&query);
    let value = Arc::new(42);

    assert!(partition.get(id, 0).is_none());
    assert!(partition.store(id, &query, Resolved::One(Arc::clone(&value)), false, 1));
    assert!(partition.contains_live(id));
    assert_eq!(partition.kind(id), Some(EntryKind::Value));

    let hit = partition.get(id, 2);
    assert!(hit.is_some_and(|resolved| resolved.same_as(&Resolved::One(value))));
}

#[test]
fn test_store_skips_identical_result() {
    let partition = partition();
    let query = Arc::new("a");
    let id = QueryId::of(&query);
    let value = Arc::new(1);

    assert!(partition.store(id, &query, Resolved::One(Arc::clone(&value)), false, 0));
    assert!(!partition.store(id, &query, Resolved::One(Arc::clone(&value)), false, 1));
    // Equal but distinct allocation replaces the entry.
    assert!(partition.store(id, &query, Resolved::One(Arc::new(1)), false, 2));
    assert!(partition.store(id, &query, Resolved::Nothing, false, 3));
    assert!(!partition.store(id, &query, Resolved::Nothing, false, 4));
}

#[test]
fn test_dead_query_reads_as_absent_and_is_pruned() {
    let partition = partition();
    let query = Arc::new("gone");
    let id = QueryId::of(&query);
    partition.store(id, &query, Resolved::Nothing, false, 0);
    drop(query);

    assert!(!partition.contains_live(id));
    assert_eq!(partition.kind(id), None);
    assert_eq!(partition.len(), 1);
    assert!(partition.get(id, 1).is_none());
    assert_eq!(partition.len(), 0);
}

#[test]
fn test_prune_dead() {
    let partition = partition();
    let kept = Arc::new("kept");
    let dropped = Arc::new("dropped");
    partition.store(QueryId::of(&kept), &kept, Resolved::Nothing, false, 0);
    partition.store(QueryId::of(&dropped), &dropped, Resolved::Nothing, false, 0);
    drop(dropped);

    assert_eq!(partition.prune_dead(), 1);
    assert_eq!(partition.len(), 1);
    assert!(partition.contains_live(QueryId::of(&kept)));
}

#[test]
fn test_reclaim_all_keeps_sentinels() {
    let partition = partition();
    let sentinel = Arc::new("null");
    let valued = Arc::new("valued");
    partition.store(QueryId::of(&sentinel), &sentinel, Resolved::Nothing, false, 0);
    partition.store(QueryId::of(&valued), &valued, Resolved::One(Arc::new(5)), false, 0);

    assert_eq!(partition.reclaim_all(), 1);
    assert_eq!(partition.kind(QueryId::of(&sentinel)), Some(EntryKind::NullSentinel));
    assert!(!partition.contains_live(QueryId::of(&valued)));
}

#[test]
fn test_reclaim_lru_drops_oldest() {
    let partition = partition();
    let queries: Vec<Arc<&'static str>> = ["a", "b", "c", "d"].into_iter().map(Arc::new).collect();
    for (tick, query) in (0u64..).zip(&queries) {
        partition.store(QueryId::of(query), query, Resolved::One(Arc::new(0)), false, tick);
    }
    // "a" is the oldest by insertion, but a hit makes it the most recent.
    partition.get(QueryId::of(&queries[0]), 10);

    assert_eq!(partition.reclaim_lru(2, QueryId::of(&queries[3])), 2);
    assert!(partition.contains_live(QueryId::of(&queries[0])));
    assert!(!partition.contains_live(QueryId::of(&queries[1])));
    assert!(!partition.contains_live(QueryId::of(&queries[2])));
    assert!(partition.contains_live(QueryId::of(&queries[3])));
}

#[test]
fn test_reclaim_lru_keeps_requested_entry_and_sentinels() {
    let partition = partition();
    let fresh = Arc::new("fresh");
    let old = Arc::new("old");
    let null = Arc::new("null");
    partition.store(QueryId::of(&null), &null, Resolved::Nothing, false, 0);
    partition.store(QueryId::of(&fresh), &fresh, Resolved::One(Arc::new(1)), false, 1);
    partition.store(QueryId::of(&old), &old, Resolved::One(Arc::new(2)), false, 2);
    assert_eq!(partition.value_count(), 2);

    // "fresh" is the least recently used, but it was just stored.
    assert_eq!(partition.reclaim_lru(2, QueryId::of(&fresh)), 1);
    assert!(partition.contains_live(QueryId::of(&fresh)));
    assert!(!partition.contains_live(QueryId::of(&old)));
    assert_eq!(partition.kind(QueryId::of(&null)), Some(EntryKind::NullSentinel));
    assert_eq!(partition.value_count(), 1);
}

#[test]
fn test_retract_only_matching_result() {
    let partition = partition();
    let query = Arc::new("a");
    let id = QueryId::of(&query);
    let stored = Arc::new(1);
    partition.store(id, &query, Resolved::One(Arc::clone(&stored)), false, 0);

    assert!(!partition.retract(id, &Resolved::One(Arc::new(1))));
    assert!(partition.retract(id, &Resolved::One(stored)));
    assert_eq!(partition.len(), 0);
}
