//! Planner analysis
//!
//! Post-planning rewrites of a solution tree: satisfying the requested
//! sort (provided order, reversed scans, sort explosion, or a blocking
//! sort stage), projection and fetch placement, skip and limit stages,
//! and shard filtering.

use serde_json::Value;

use crate::observability::{Event, Logger};
use crate::query::{
    is_empty_doc, is_natural_sort, ordered_eq, reverse_sort_document, CanonicalQuery,
};

use super::bounds::{IndexBounds, Interval, OrderedIntervalList};
use super::solution::{key_pattern_suffix, IndexScanNode, QuerySolution, SolutionNode};
use super::PlannerParams;

/// Cap on the number of scans a sort explosion may produce.
pub const MAX_SCANS_TO_EXPLODE: usize = 50;

/// Explosion only pays off when we know the sort comes out: a bare index
/// scan, or an index scan under a fetch.
fn structure_ok_for_explode(root: &SolutionNode) -> bool {
    match root {
        SolutionNode::IndexScan(_) => true,
        SolutionNode::Fetch { child } => matches!(child.as_ref(), SolutionNode::IndexScan(_)),
        _ => false,
    }
}

fn collect_leaf_scans(root: &SolutionNode) -> Vec<&IndexScanNode> {
    match root {
        SolutionNode::IndexScan(isn) => vec![isn],
        SolutionNode::Fetch { child } => collect_leaf_scans(child),
        _ => Vec::new(),
    }
}

/// The first `fields_to_explode` interval lists of `bounds` are unions of
/// points. Computes the Cartesian product of those points, one point
/// prefix per resulting scan.
fn make_cartesian_product(bounds: &IndexBounds, fields_to_explode: usize) -> Vec<Vec<Interval>> {
    let mut prefixes: Vec<Vec<Interval>> = bounds.fields[0]
        .intervals
        .iter()
        .map(|interval| vec![interval.clone()])
        .collect();

    for field in &bounds.fields[1..fields_to_explode] {
        let mut extended = Vec::with_capacity(prefixes.len() * field.intervals.len());
        for interval in &field.intervals {
            for prefix in &prefixes {
                let mut next = prefix.clone();
                next.push(interval.clone());
                extended.push(next);
            }
        }
        prefixes = extended;
    }

    prefixes
}

/// Replaces an index scan by a merge sort of per-point clones.
///
/// For `{a: {$in: [1, 2]}}` sorted by `{b: 1}` over the index `{a: 1,
/// b: 1}`, the scan with bounds `a: [[1,1],[2,2]], b: [min,max]` becomes a
/// merge sort of two scans, one with `a: [[1,1]]` and one with
/// `a: [[2,2]]`, each keeping the `b` bounds.
fn explode_scan(isn: &IndexScanNode, sort: &Value, fields_to_explode: usize) -> SolutionNode {
    let prefixes = make_cartesian_product(&isn.bounds, fields_to_explode);

    let mut children = Vec::with_capacity(prefixes.len());
    for prefix in prefixes {
        let mut child = IndexScanNode::new(isn.key_pattern.clone());
        child.direction = isn.direction;
        child.multikey = isn.multikey;

        child.bounds.fields = Vec::with_capacity(isn.bounds.fields.len());
        for (idx, interval) in prefix.into_iter().enumerate() {
            child.bounds.fields.push(OrderedIntervalList::with_intervals(
                isn.bounds.fields[idx].name.clone(),
                vec![interval],
            ));
        }
        for field in &isn.bounds.fields[fields_to_explode..] {
            child.bounds.fields.push(field.clone());
        }

        children.push(SolutionNode::IndexScan(child));
    }

    SolutionNode::MergeSort {
        sort: sort.clone(),
        children,
    }
}

/// Tries to rewrite the tree so an index scan over point-interval prefixes
/// provides the requested sort as a merge-sorted union of per-point scans.
///
/// Returns false, leaving the tree untouched, when the structure does not
/// qualify, the bound suffix does not match the sort, or the rewrite would
/// produce more than `MAX_SCANS_TO_EXPLODE` scans.
pub fn explode_for_sort(query: &CanonicalQuery, root: &mut SolutionNode) -> bool {
    if !structure_ok_for_explode(root) {
        return false;
    }

    let desired_sort = query.request().sort().clone();
    let leaves = collect_leaf_scans(root);

    let mut total_num_scans = 0usize;
    // Entry i is how many prefix fields to blow up for leaf i.
    let mut fields_to_explode = Vec::with_capacity(leaves.len());

    for isn in &leaves {
        if isn.bounds.is_simple_range {
            return false;
        }

        let num_key_fields = match &isn.key_pattern {
            Value::Object(obj) => obj.len(),
            _ => return false,
        };
        if isn.bounds.fields.len() != num_key_fields {
            return false;
        }

        // Walk the point-interval prefix and count the scans it expands to.
        let mut num_scans = 1usize;
        let mut prefix_len = 0usize;
        while prefix_len < num_key_fields {
            let oil = &isn.bounds.fields[prefix_len];
            if oil.intervals.is_empty() || !oil.is_union_of_points() {
                break;
            }
            num_scans *= oil.intervals.len();
            prefix_len += 1;
        }

        // Nothing to explode, or no sort order left to gain.
        if prefix_len == 0 || prefix_len == num_key_fields {
            return false;
        }

        // The remaining fields are the sort the exploded scans provide.
        let possible_sort = key_pattern_suffix(&isn.key_pattern, prefix_len);
        if !ordered_eq(&possible_sort, &desired_sort) {
            return false;
        }

        total_num_scans += num_scans;
        fields_to_explode.push(prefix_len);
    }

    if total_num_scans > MAX_SCANS_TO_EXPLODE {
        let scans = total_num_scans.to_string();
        Logger::info(
            Event::SortExplosionRefused.as_str(),
            &[("scans", scans.as_str())],
        );
        return false;
    }

    // The structure check admits exactly one scan, optionally under a
    // fetch; rewrite it in place.
    let slot: &mut SolutionNode = match root {
        SolutionNode::Fetch { child } => child.as_mut(),
        other => other,
    };
    let exploded = match &*slot {
        SolutionNode::IndexScan(isn) => explode_scan(isn, &desired_sort, fields_to_explode[0]),
        _ => return false,
    };
    *slot = exploded;

    let scans = total_num_scans.to_string();
    Logger::trace(Event::SortExploded.as_str(), &[("scans", scans.as_str())]);
    true
}

/// Flips every scan in the tree: directions reverse and bounds run
/// backwards, so the tree provides the reverse of its former orders.
pub fn reverse_scans(node: &mut SolutionNode) {
    match node {
        SolutionNode::CollectionScan { direction, .. } => *direction = -*direction,
        SolutionNode::IndexScan(isn) => {
            isn.direction = -isn.direction;
            isn.bounds.reverse();
        }
        SolutionNode::MergeSort { sort, children } => {
            *sort = reverse_sort_document(sort);
            for child in children {
                reverse_scans(child);
            }
        }
        SolutionNode::Or { children } => {
            for child in children {
                reverse_scans(child);
            }
        }
        SolutionNode::Fetch { child }
        | SolutionNode::Sort { child, .. }
        | SolutionNode::Skip { child, .. }
        | SolutionNode::Limit { child, .. }
        | SolutionNode::Projection { child, .. }
        | SolutionNode::ShardingFilter { child } => reverse_scans(child),
    }
}

/// Makes the tree satisfy the requested sort.
///
/// In order: an empty or `$natural` sort needs nothing; a provided order
/// needs nothing; the reverse of a provided order reverses the scans; a
/// point-prefix scan explodes; otherwise a blocking sort stage is
/// inserted over fetched documents, with its buffer limited to
/// `num_to_return + skip` when the query has a limit. Returns the tree
/// and whether a blocking sort was added, or None when a blocking sort is
/// needed but forbidden.
pub fn analyze_sort(
    query: &CanonicalQuery,
    params: &PlannerParams,
    mut root: SolutionNode,
) -> Option<(SolutionNode, bool)> {
    let request = query.request();
    let sort = request.sort();

    if is_empty_doc(sort) {
        return Some((root, false));
    }

    // A $natural sort is the caller asking for scan order; the planner
    // already emits a collection scan for it.
    if is_natural_sort(sort) {
        return Some((root, false));
    }

    let provided = root.provided_sorts();
    if provided.iter().any(|p| ordered_eq(p, sort)) {
        return Some((root, false));
    }

    let reversed = reverse_sort_document(sort);
    if provided.iter().any(|p| ordered_eq(p, &reversed)) {
        reverse_scans(&mut root);
        return Some((root, false));
    }

    if explode_for_sort(query, &mut root) {
        return Some((root, false));
    }

    if params.no_blocking_sort {
        return None;
    }

    // The sort stage orders full documents.
    if !root.fetched() {
        root = SolutionNode::fetch(root);
    }

    // The sort must buffer limit + skip results so the skip stage can
    // discard the first skip of them.
    let limit = if request.num_to_return() != 0 {
        request.num_to_return() + request.skip()
    } else {
        0
    };

    let root = SolutionNode::Sort {
        pattern: sort.clone(),
        limit,
        child: Box::new(root),
    };
    Some((root, true))
}

/// Composes the final plan around a data-access tree: shard filtering,
/// sort handling, projection and fetch placement, skip, and limit.
///
/// Returns None when a blocking sort is required but forbidden.
pub fn analyze_data_access(
    query: &CanonicalQuery,
    params: &PlannerParams,
    mut root: SolutionNode,
) -> Option<QuerySolution> {
    let request = query.request();

    if params.include_shard_filter {
        if !root.fetched() {
            root = SolutionNode::fetch(root);
        }
        root = SolutionNode::ShardingFilter {
            child: Box::new(root),
        };
    }

    let (mut root, has_sort_stage) = analyze_sort(query, params, root)?;

    if let Some(projection) = query.parsed_projection() {
        if projection.requires_document() {
            if !root.fetched() {
                root = SolutionNode::fetch(root);
            }
        } else {
            let covered = projection
                .required_fields()
                .iter()
                .all(|field| root.has_field(field));
            if !covered && !root.fetched() {
                root = SolutionNode::fetch(root);
            }
        }
        root = SolutionNode::Projection {
            projection: request.projection().clone(),
            child: Box::new(root),
        };
    } else if !root.fetched() {
        // No projection: the caller gets whole documents.
        root = SolutionNode::fetch(root);
    }

    if request.skip() != 0 {
        root = SolutionNode::Skip {
            skip: request.skip(),
            child: Box::new(root),
        };
    }

    // A blocking sort already enforces the limit; otherwise a hard limit
    // needs its own stage.
    if request.num_to_return() != 0 && !has_sort_stage && !request.want_more() {
        root = SolutionNode::Limit {
            limit: request.num_to_return(),
            child: Box::new(root),
        };
    }

    Some(QuerySolution {
        root,
        has_sort_stage,
        ns: request.ns().to_string(),
        filter: request.filter().clone(),
        cache_data: None,
    })
}
