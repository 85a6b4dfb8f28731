//! Sort Explosion Tests
//!
//! End-to-end tests of the point-prefix rewrite:
//! - The literal two-point scenario over the (a, b) index
//! - The scan-count cap
//! - Merge-sort ordering matches the requested sort
//! - Composition with the surrounding analysis passes

use serde_json::json;
use talondb::planner::{
    analyze_data_access, explode_for_sort, IndexBounds, IndexScanNode, Interval,
    OrderedIntervalList, PlannerParams, SolutionNode, MAX_SCANS_TO_EXPLODE,
};
use talondb::query::{CanonicalQuery, QueryRequest};

// =============================================================================
// Helper Functions
// =============================================================================

fn canonicalize(request: QueryRequest) -> CanonicalQuery {
    CanonicalQuery::canonicalize(request).unwrap()
}

/// A scan of the (a, b) index with point bounds on `a` and full bounds on
/// `b`, the shape produced for `{a: {$in: [...]}}` sorted by `{b: 1}`.
fn in_query_scan(points: usize) -> IndexScanNode {
    let mut isn = IndexScanNode::new(json!({"a": 1, "b": 1}));
    isn.bounds = IndexBounds {
        fields: vec![
            OrderedIntervalList::with_intervals(
                "a",
                (0..points)
                    .map(|p| Interval::point(json!(p as i64)))
                    .collect(),
            ),
            OrderedIntervalList::with_intervals("b", vec![Interval::full()]),
        ],
        is_simple_range: false,
    };
    isn
}

// =============================================================================
// Rewrite Tests
// =============================================================================

/// `{a: {$in: [1, 2]}}` sorted by `{b: 1}` over the (a, b) index becomes
/// a merge sort of two single-point scans.
#[test]
fn test_two_point_explosion() {
    let query = canonicalize(
        QueryRequest::new("test.coll", json!({"a": {"$in": [1, 2]}})).with_sort(json!({"b": 1})),
    );
    let mut root = SolutionNode::IndexScan(in_query_scan(2));

    assert!(explode_for_sort(&query, &mut root));

    let SolutionNode::MergeSort { sort, children } = &root else {
        panic!("expected a merge sort, got {:?}", root);
    };
    assert_eq!(sort, &json!({"b": 1}));
    assert_eq!(children.len(), 2);

    for child in children {
        let SolutionNode::IndexScan(isn) = child else {
            panic!("merge sort children must be index scans");
        };
        // One point on `a`, untouched bounds on `b`.
        assert_eq!(isn.bounds.fields[0].intervals.len(), 1);
        assert!(isn.bounds.fields[0].intervals[0].is_point());
        assert_eq!(isn.bounds.fields[1].intervals, vec![Interval::full()]);
        assert_eq!(isn.key_pattern, json!({"a": 1, "b": 1}));
    }
}

/// Every rewritten tree keeps its leaf count within the cap.
#[test]
fn test_leaf_count_bounded() {
    for points in [1usize, 5, 25, 50] {
        let query = canonicalize(
            QueryRequest::new("test.coll", json!({"a": {"$in": [0]}}))
                .with_sort(json!({"b": 1})),
        );
        let mut root = SolutionNode::IndexScan(in_query_scan(points));
        assert!(explode_for_sort(&query, &mut root), "points = {}", points);
        assert!(root.num_leaves() <= MAX_SCANS_TO_EXPLODE);
        assert_eq!(root.num_leaves(), points);
    }
}

/// Fifty-one points exceed the cap: the rewrite is refused and the tree
/// is left untouched.
#[test]
fn test_fifty_one_points_refused() {
    let query = canonicalize(
        QueryRequest::new("test.coll", json!({"a": {"$in": [0]}})).with_sort(json!({"b": 1})),
    );
    let original = SolutionNode::IndexScan(in_query_scan(51));
    let mut root = original.clone();

    assert!(!explode_for_sort(&query, &mut root));
    assert_eq!(root, original);
}

/// A compound point prefix multiplies: 3 points on `a` times 2 on `b`
/// gives 6 scans sorted on the `c` suffix.
#[test]
fn test_compound_prefix_cartesian_product() {
    let query = canonicalize(
        QueryRequest::new(
            "test.coll",
            json!({"a": {"$in": [1, 2, 3]}, "b": {"$in": [7, 8]}}),
        )
        .with_sort(json!({"c": 1})),
    );

    let mut isn = IndexScanNode::new(json!({"a": 1, "b": 1, "c": 1}));
    isn.bounds = IndexBounds {
        fields: vec![
            OrderedIntervalList::with_intervals(
                "a",
                vec![
                    Interval::point(json!(1)),
                    Interval::point(json!(2)),
                    Interval::point(json!(3)),
                ],
            ),
            OrderedIntervalList::with_intervals(
                "b",
                vec![Interval::point(json!(7)), Interval::point(json!(8))],
            ),
            OrderedIntervalList::with_intervals("c", vec![Interval::full()]),
        ],
        is_simple_range: false,
    };
    let mut root = SolutionNode::IndexScan(isn);

    assert!(explode_for_sort(&query, &mut root));
    let SolutionNode::MergeSort { sort, children } = &root else {
        panic!("expected a merge sort");
    };
    assert_eq!(sort, &json!({"c": 1}));
    assert_eq!(children.len(), 6);
    for child in children {
        let SolutionNode::IndexScan(isn) = child else {
            panic!("merge sort children must be index scans");
        };
        assert!(isn.bounds.fields[0].intervals[0].is_point());
        assert!(isn.bounds.fields[1].intervals[0].is_point());
        assert_eq!(isn.bounds.fields[2].intervals, vec![Interval::full()]);
    }
}

/// A sort the suffix cannot provide refuses the rewrite.
#[test]
fn test_mismatched_sort_refused() {
    let query = canonicalize(
        QueryRequest::new("test.coll", json!({"a": {"$in": [1, 2]}})).with_sort(json!({"z": 1})),
    );
    let mut root = SolutionNode::IndexScan(in_query_scan(2));
    assert!(!explode_for_sort(&query, &mut root));
}

// =============================================================================
// Composition Tests
// =============================================================================

/// Through the full analysis pass, the exploded plan carries no blocking
/// sort and ends fetched.
#[test]
fn test_analysis_uses_explosion_instead_of_sort() {
    let query = canonicalize(
        QueryRequest::new("test.coll", json!({"a": {"$in": [1, 2]}})).with_sort(json!({"b": 1})),
    );
    let root = SolutionNode::IndexScan(in_query_scan(2));

    let solution = analyze_data_access(&query, &PlannerParams::default(), root).unwrap();
    assert!(!solution.has_sort_stage);

    // The merge sort is in there, under the fetch.
    fn contains_merge_sort(node: &SolutionNode) -> bool {
        match node {
            SolutionNode::MergeSort { .. } => true,
            SolutionNode::Fetch { child }
            | SolutionNode::Sort { child, .. }
            | SolutionNode::Skip { child, .. }
            | SolutionNode::Limit { child, .. }
            | SolutionNode::Projection { child, .. }
            | SolutionNode::ShardingFilter { child } => contains_merge_sort(child),
            _ => false,
        }
    }
    assert!(contains_merge_sort(&solution.root));
    assert!(solution.root.fetched());
}

/// When the explosion is refused, analysis falls back to a blocking sort.
#[test]
fn test_analysis_falls_back_to_blocking_sort() {
    let query = canonicalize(
        QueryRequest::new("test.coll", json!({"a": {"$in": [0]}})).with_sort(json!({"b": 1})),
    );
    let root = SolutionNode::IndexScan(in_query_scan(51));

    let solution = analyze_data_access(&query, &PlannerParams::default(), root).unwrap();
    assert!(solution.has_sort_stage);
}

/// When the explosion is refused and blocking sorts are forbidden,
/// analysis fails.
#[test]
fn test_analysis_fails_when_sort_forbidden() {
    let query = canonicalize(
        QueryRequest::new("test.coll", json!({"a": {"$in": [0]}})).with_sort(json!({"b": 1})),
    );
    let params = PlannerParams {
        no_blocking_sort: true,
        ..PlannerParams::default()
    };
    let root = SolutionNode::IndexScan(in_query_scan(51));

    assert!(analyze_data_access(&query, &params, root).is_none());
}
