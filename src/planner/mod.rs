//! Query planner subsystem
//!
//! Solution trees, index bounds, and the post-planning analysis passes
//! (sort handling including sort explosion, projection and fetch
//! placement, skip/limit composition).

mod analysis;
mod bounds;
mod solution;

pub use analysis::{
    analyze_data_access, analyze_sort, explode_for_sort, reverse_scans, MAX_SCANS_TO_EXPLODE,
};
pub use bounds::{max_key, min_key, IndexBounds, Interval, OrderedIntervalList};
pub use solution::{key_pattern_suffix, IndexScanNode, QuerySolution, SolutionNode};

use serde_json::Value;

/// Catalog metadata about one index, as the planner sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexInfo {
    /// The index key pattern, e.g. `{a: 1, b: -1}`
    pub key_pattern: Value,
    /// Whether any indexed field holds arrays
    pub multikey: bool,
    /// Whether the index skips documents missing its fields
    pub sparse: bool,
    /// Index name in the catalog
    pub name: String,
}

impl IndexInfo {
    /// Index metadata with the conventional name derived from the key
    /// pattern, e.g. `{a: 1, b: -1}` names itself `a_1_b_-1`.
    pub fn new(key_pattern: Value) -> Self {
        let name = default_index_name(&key_pattern);
        Self {
            key_pattern,
            multikey: false,
            sparse: false,
            name,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn multikey(mut self, multikey: bool) -> Self {
        self.multikey = multikey;
        self
    }
}

fn default_index_name(key_pattern: &Value) -> String {
    let Value::Object(obj) = key_pattern else {
        return String::new();
    };
    let parts: Vec<String> = obj
        .iter()
        .map(|(field, direction)| match direction.as_i64() {
            Some(d) => format!("{}_{}", field, d),
            None => format!("{}_{}", field, direction),
        })
        .collect();
    parts.join("_")
}

/// Options steering the analysis passes for one planning attempt.
#[derive(Debug, Clone, Default)]
pub struct PlannerParams {
    /// Fail instead of inserting a blocking sort stage
    pub no_blocking_sort: bool,
    /// Wrap the plan in a sharding filter over fetched documents
    pub include_shard_filter: bool,
    /// Whether an allowed-indexes entry restricted the candidate set
    pub admin_hint_applied: bool,
    /// Candidate indexes for this planning attempt
    pub indexes: Vec<IndexInfo>,
}

/// Records on each solution's cache data whether an allowed-indexes entry
/// restricted this planning attempt.
pub fn mark_admin_hint_applied(solutions: &mut [QuerySolution], params: &PlannerParams) {
    if !params.admin_hint_applied {
        return;
    }
    for solution in solutions {
        if let Some(cache_data) = &mut solution.cache_data {
            cache_data.admin_hint_applied = true;
        }
    }
}
