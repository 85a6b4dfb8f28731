//! Plan Cache Invariant Tests
//!
//! Tests for cache invariants:
//! - Retrieved solutions are structurally equal to, but independent of,
//!   stored state
//! - Replacement under one key keeps the entry count
//! - The write-operation counter clears the whole cache
//! - Feedback evicts exactly when the degradation predicate holds

use serde_json::json;
use talondb::plan_cache::{
    IndexEntryData, PlanCache, PlanCacheIndexTree, PlanFeedback, PlanRankingDecision,
    SolutionCacheData, MAX_FEEDBACK, MAX_WRITE_OPERATIONS,
};
use talondb::planner::QuerySolution;
use talondb::query::{CanonicalQuery, QueryRequest};

// =============================================================================
// Helper Functions
// =============================================================================

fn canonicalize(filter: serde_json::Value) -> CanonicalQuery {
    CanonicalQuery::canonicalize(QueryRequest::new("test.coll", filter)).unwrap()
}

fn tagged_solution() -> QuerySolution {
    let mut leaf = PlanCacheIndexTree::new();
    leaf.set_index_entry(IndexEntryData::new(json!({"a": 1}), "a_1"), 0);
    let mut root = PlanCacheIndexTree::new();
    root.children.push(leaf);

    QuerySolution::collection_scan_solution("test.coll", json!({}))
        .with_cache_data(SolutionCacheData::tagged_expression(root))
}

// =============================================================================
// Clone Identity Tests
// =============================================================================

/// A retrieved solution equals the stored plan data but shares nothing
/// with it: mutating the retrieved copy does not affect later reads.
#[test]
fn test_get_returns_independent_clone() {
    let cache = PlanCache::new();
    let cq = canonicalize(json!({"a": 1}));
    cache
        .add(&cq, &[tagged_solution()], PlanRankingDecision::new(1.0))
        .unwrap();

    let mut first = cache.get(&cq).unwrap();
    let second = cache.get(&cq).unwrap();
    assert_eq!(first.planner_data, second.planner_data);

    // Deface the first copy.
    first.planner_data[0]
        .tree
        .as_mut()
        .unwrap()
        .children
        .clear();

    let third = cache.get(&cq).unwrap();
    assert_eq!(second.planner_data, third.planner_data);
    assert_ne!(first.planner_data, third.planner_data);
}

/// Two retrievals give equal payload documents that are separate values.
#[test]
fn test_get_clones_payloads() {
    let cache = PlanCache::new();
    let cq = CanonicalQuery::canonicalize(
        QueryRequest::new("test.coll", json!({"a": 1}))
            .with_sort(json!({"b": -1}))
            .with_projection(json!({"_id": 0, "a": 1})),
    )
    .unwrap();
    cache
        .add(&cq, &[tagged_solution()], PlanRankingDecision::new(1.0))
        .unwrap();

    let cached = cache.get(&cq).unwrap();
    assert_eq!(cached.query, json!({"a": 1}));
    assert_eq!(cached.sort, json!({"b": -1}));
    assert_eq!(cached.projection, json!({"_id": 0, "a": 1}));
}

// =============================================================================
// Replacement Tests
// =============================================================================

/// Adding under an existing key replaces the entry and keeps the size.
#[test]
fn test_replacement_keeps_size() {
    let cache = PlanCache::new();
    let cq = canonicalize(json!({"a": 1}));

    cache
        .add(&cq, &[tagged_solution()], PlanRankingDecision::new(1.0))
        .unwrap();
    assert_eq!(cache.size(), 1);

    cache
        .add(
            &cq,
            &[tagged_solution(), tagged_solution()],
            PlanRankingDecision::new(5.0),
        )
        .unwrap();
    assert_eq!(cache.size(), 1);
    assert_eq!(cache.get(&cq).unwrap().planner_data.len(), 2);
}

/// Two shapes coexist under different keys.
#[test]
fn test_distinct_shapes_coexist() {
    let cache = PlanCache::new();
    let one = canonicalize(json!({"a": 1}));
    let two = canonicalize(json!({"b": 1}));

    cache
        .add(&one, &[tagged_solution()], PlanRankingDecision::new(1.0))
        .unwrap();
    cache
        .add(&two, &[tagged_solution()], PlanRankingDecision::new(1.0))
        .unwrap();
    assert_eq!(cache.size(), 2);

    cache.remove(&one).unwrap();
    assert_eq!(cache.size(), 1);
    assert!(cache.get(&two).is_ok());
}

// =============================================================================
// Write Counter Tests
// =============================================================================

/// After the write threshold is reached, the next operation sees an empty
/// cache.
#[test]
fn test_write_counter_clears_cache() {
    let cache = PlanCache::new();
    let cq = canonicalize(json!({"a": 1}));
    cache
        .add(&cq, &[tagged_solution()], PlanRankingDecision::new(1.0))
        .unwrap();

    for _ in 0..(MAX_WRITE_OPERATIONS - 1) {
        cache.notify_of_write_op();
    }
    assert_eq!(cache.size(), 1);

    cache.notify_of_write_op();
    assert_eq!(cache.size(), 0);
}

// =============================================================================
// Feedback Tests
// =============================================================================

/// The literal degradation scenario: decision score 10, twenty feedback
/// records of score 1. The baseline is mean 1, deviation 0; the next
/// record evicts since 10 - 1 = 9 > 0.
#[test]
fn test_feedback_eviction_scenario() {
    let cache = PlanCache::new();
    let cq = canonicalize(json!({"a": 1}));
    cache
        .add(&cq, &[tagged_solution()], PlanRankingDecision::new(10.0))
        .unwrap();

    for _ in 0..MAX_FEEDBACK {
        cache.feedback(&cq, PlanFeedback::new(1.0)).unwrap();
        assert_eq!(cache.size(), 1);
    }

    cache.feedback(&cq, PlanFeedback::new(1.0)).unwrap();
    assert_eq!(cache.size(), 0);
    assert!(cache.get(&cq).is_err());
}

/// An entry whose decision score matches its observed performance
/// survives any amount of consistent feedback.
#[test]
fn test_feedback_no_eviction_when_consistent() {
    let cache = PlanCache::new();
    let cq = canonicalize(json!({"a": 1}));
    cache
        .add(&cq, &[tagged_solution()], PlanRankingDecision::new(1.0))
        .unwrap();

    for i in 0..(MAX_FEEDBACK * 3) {
        // Spread scores around the decision score so the deviation is
        // non-zero and the mean matches.
        let score = if i % 2 == 0 { 0.9 } else { 1.1 };
        cache.feedback(&cq, PlanFeedback::new(score)).unwrap();
        assert_eq!(cache.size(), 1);
    }
}

/// Feedback on a shape that is not cached is an error and has no effect.
#[test]
fn test_feedback_absent_key() {
    let cache = PlanCache::new();
    let cq = canonicalize(json!({"a": 1}));
    assert!(cache.feedback(&cq, PlanFeedback::new(1.0)).is_err());
    assert_eq!(cache.size(), 0);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

/// Concurrent adds, reads, and write notifications keep the cache
/// consistent: every read sees either a full entry or a missing key.
#[test]
fn test_concurrent_operations() {
    use std::sync::Arc;
    use std::thread;

    let cache = Arc::new(PlanCache::new());
    let mut handles = Vec::new();

    for worker in 0..4 {
        let cache = Arc::clone(&cache);
        handles.push(thread::spawn(move || {
            let cq = canonicalize(json!({"a": worker}));
            for _ in 0..100 {
                cache
                    .add(&cq, &[tagged_solution()], PlanRankingDecision::new(1.0))
                    .unwrap();
                if let Ok(cached) = cache.get(&cq) {
                    assert_eq!(cached.planner_data.len(), 1);
                }
                cache.notify_of_write_op();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}
