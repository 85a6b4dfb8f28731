//! Hint Command Tests
//!
//! End-to-end tests of the administrative hint surface:
//! - Set / list / clear round trips
//! - Same-shape replacement
//! - Plan cache eviction coupling

use serde_json::json;
use talondb::commands::{clear_hints, list_hints, set_hint};
use talondb::plan_cache::{PlanCache, PlanRankingDecision, SolutionCacheData};
use talondb::planner::QuerySolution;
use talondb::query::{CanonicalQuery, QueryRequest};
use talondb::query_settings::QuerySettings;

const NS: &str = "test.coll";

// =============================================================================
// Helper Functions
// =============================================================================

fn hint_count(settings: &QuerySettings) -> usize {
    list_hints(settings)["hints"].as_array().unwrap().len()
}

fn cache_solution(cache: &PlanCache, cq: &CanonicalQuery) {
    let solution = QuerySolution::collection_scan_solution(NS, json!({}))
        .with_cache_data(SolutionCacheData::collection_scan());
    cache
        .add(cq, &[solution], PlanRankingDecision::new(1.0))
        .unwrap();
}

// =============================================================================
// Round-Trip Tests
// =============================================================================

/// The full set/clear lifecycle over two shapes.
#[test]
fn test_set_clear_round_trip() {
    let settings = QuerySettings::new();
    let cache = PlanCache::new();
    assert_eq!(hint_count(&settings), 0);

    // Set a hint for shape A.
    let result = set_hint(
        &settings,
        &cache,
        NS,
        &json!({
            "query": {"a": 1, "b": 1},
            "sort": {"a": -1},
            "projection": {"_id": 0, "a": 1},
            "indexes": [{"a": 1}]
        }),
    );
    assert_eq!(result["ok"], json!(1));
    let listed = list_hints(&settings);
    let hints = listed["hints"].as_array().unwrap();
    assert_eq!(hints.len(), 1);
    assert_eq!(hints[0]["query"], json!({"a": 1, "b": 1}));
    assert_eq!(hints[0]["sort"], json!({"a": -1}));
    assert_eq!(hints[0]["projection"], json!({"_id": 0, "a": 1}));
    assert_eq!(hints[0]["indexes"], json!([{"a": 1}]));

    // Same shape, different values: replaces, does not grow.
    let result = set_hint(
        &settings,
        &cache,
        NS,
        &json!({
            "query": {"b": 2, "a": 3},
            "sort": {"a": -1},
            "projection": {"_id": 0, "a": 1},
            "indexes": [{"a": 1, "b": 1}]
        }),
    );
    assert_eq!(result["ok"], json!(1));
    assert_eq!(hint_count(&settings), 1);

    // A new shape grows the list.
    let result = set_hint(
        &settings,
        &cache,
        NS,
        &json!({"query": {"b": 1}, "indexes": [{"b": 1}]}),
    );
    assert_eq!(result["ok"], json!(1));
    assert_eq!(hint_count(&settings), 2);

    // Clearing a shape that was never pinned succeeds and changes nothing.
    let result = clear_hints(&settings, &cache, NS, &json!({"query": {"a": 1}}));
    assert_eq!(result["ok"], json!(1));
    assert_eq!(hint_count(&settings), 2);

    // Clearing everything empties the list.
    let result = clear_hints(&settings, &cache, NS, &json!({}));
    assert_eq!(result["ok"], json!(1));
    assert_eq!(hint_count(&settings), 0);
}

/// The replacement hint's indexes win.
#[test]
fn test_replacement_updates_indexes() {
    let settings = QuerySettings::new();
    let cache = PlanCache::new();

    set_hint(
        &settings,
        &cache,
        NS,
        &json!({"query": {"a": 1}, "indexes": [{"a": 1}]}),
    );
    set_hint(
        &settings,
        &cache,
        NS,
        &json!({"query": {"a": 2}, "indexes": [{"a": 1, "b": 1}]}),
    );

    let listed = list_hints(&settings);
    let hints = listed["hints"].as_array().unwrap();
    assert_eq!(hints.len(), 1);
    assert_eq!(hints[0]["indexes"], json!([{"a": 1, "b": 1}]));
}

// =============================================================================
// Plan Cache Coupling Tests
// =============================================================================

/// Setting a hint for a shape evicts that shape's cached plan.
#[test]
fn test_set_hint_evicts_cached_plan() {
    let settings = QuerySettings::new();
    let cache = PlanCache::new();

    let cq = CanonicalQuery::canonicalize(QueryRequest::new(NS, json!({"a": 1}))).unwrap();
    cache_solution(&cache, &cq);
    assert!(cache.get(&cq).is_ok());

    set_hint(
        &settings,
        &cache,
        NS,
        &json!({"query": {"a": 5}, "indexes": [{"a": 1}]}),
    );
    assert!(cache.get(&cq).is_err());
}

/// Clearing one hint evicts only that shape's cached plan.
#[test]
fn test_clear_hint_evicts_one_shape() {
    let settings = QuerySettings::new();
    let cache = PlanCache::new();

    let one = CanonicalQuery::canonicalize(QueryRequest::new(NS, json!({"a": 1}))).unwrap();
    let two = CanonicalQuery::canonicalize(QueryRequest::new(NS, json!({"b": 1}))).unwrap();
    cache_solution(&cache, &one);
    cache_solution(&cache, &two);

    clear_hints(&settings, &cache, NS, &json!({"query": {"a": 9}}));
    assert!(cache.get(&one).is_err());
    assert!(cache.get(&two).is_ok());
}

/// Clearing all hints evicts the cached plan of every pinned shape, and
/// only those.
#[test]
fn test_clear_all_evicts_pinned_shapes() {
    let settings = QuerySettings::new();
    let cache = PlanCache::new();

    let pinned = CanonicalQuery::canonicalize(QueryRequest::new(NS, json!({"a": 1}))).unwrap();
    let unpinned = CanonicalQuery::canonicalize(QueryRequest::new(NS, json!({"b": 1}))).unwrap();
    cache_solution(&cache, &pinned);
    cache_solution(&cache, &unpinned);

    set_hint(
        &settings,
        &cache,
        NS,
        &json!({"query": {"a": 1}, "indexes": [{"a": 1}]}),
    );
    // The pinned shape's plan is already gone; re-plan it.
    cache_solution(&cache, &pinned);

    clear_hints(&settings, &cache, NS, &json!({}));
    assert!(cache.get(&pinned).is_err());
    assert!(cache.get(&unpinned).is_ok());
}

// =============================================================================
// Validation Tests
// =============================================================================

/// Malformed command bodies surface `{ok: 0, code, errmsg}`.
#[test]
fn test_error_result_documents() {
    let settings = QuerySettings::new();
    let cache = PlanCache::new();

    let result = set_hint(&settings, &cache, NS, &json!({"query": {"a": 1}}));
    assert_eq!(result["ok"], json!(0));
    assert_eq!(result["code"], json!(2));
    assert!(result["errmsg"].as_str().unwrap().contains("indexes"));

    let result = clear_hints(
        &settings,
        &cache,
        NS,
        &json!({"projection": {"a": 1}}),
    );
    assert_eq!(result["ok"], json!(0));
    assert_eq!(result["code"], json!(2));

    let result = clear_hints(&settings, &cache, NS, &json!({"query": "not an object"}));
    assert_eq!(result["ok"], json!(0));
}
