//! Query solution trees
//!
//! A planned query is a tree of stages. Leaves access data (collection
//! scan, index scan); interior stages transform it (fetch, merge sort,
//! sort, skip, limit, projection, sharding filter). The tree is owned by
//! the planning thread and mutated in place by planner analysis.

use serde_json::{Map, Value};

use crate::plan_cache::SolutionCacheData;
use crate::query::reverse_sort_document;

use super::bounds::IndexBounds;

/// An index scan leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexScanNode {
    /// Key pattern of the scanned index, e.g. `{a: 1, b: 1}`
    pub key_pattern: Value,
    /// 1 forward, -1 reverse
    pub direction: i32,
    /// Whether the index is multikey
    pub multikey: bool,
    pub bounds: IndexBounds,
}

impl IndexScanNode {
    /// A forward scan with empty bounds.
    pub fn new(key_pattern: Value) -> Self {
        Self {
            key_pattern,
            direction: 1,
            multikey: false,
            bounds: IndexBounds::new(),
        }
    }

    /// The sort order this scan provides: its key pattern, reversed when
    /// scanning backwards.
    pub fn provided_sort(&self) -> Value {
        if self.direction < 0 {
            reverse_sort_document(&self.key_pattern)
        } else {
            self.key_pattern.clone()
        }
    }
}

/// One stage of a planned query.
#[derive(Debug, Clone, PartialEq)]
pub enum SolutionNode {
    /// Scan the whole collection
    CollectionScan {
        /// 1 forward, -1 reverse
        direction: i32,
        /// Residual filter applied per document
        filter: Value,
    },
    /// Scan an index
    IndexScan(IndexScanNode),
    /// Fetch full documents for index entries
    Fetch { child: Box<SolutionNode> },
    /// Merge already-sorted children into one sorted stream
    MergeSort {
        sort: Value,
        children: Vec<SolutionNode>,
    },
    /// Union of children, unordered
    Or { children: Vec<SolutionNode> },
    /// Blocking sort
    Sort {
        pattern: Value,
        /// Upper bound on buffered results; 0 means unbounded
        limit: u64,
        child: Box<SolutionNode>,
    },
    /// Discard the first `skip` results
    Skip { skip: u64, child: Box<SolutionNode> },
    /// Cut the stream off after `limit` results
    Limit { limit: u64, child: Box<SolutionNode> },
    /// Apply a projection
    Projection {
        projection: Value,
        child: Box<SolutionNode>,
    },
    /// Drop documents not owned by this shard
    ShardingFilter { child: Box<SolutionNode> },
}

impl SolutionNode {
    /// Wraps a child in a fetch stage.
    pub fn fetch(child: SolutionNode) -> Self {
        SolutionNode::Fetch {
            child: Box::new(child),
        }
    }

    /// Whether results flowing out of this stage are full documents.
    pub fn fetched(&self) -> bool {
        match self {
            SolutionNode::CollectionScan { .. } => true,
            SolutionNode::IndexScan(_) => false,
            SolutionNode::Fetch { .. } => true,
            SolutionNode::MergeSort { children, .. } | SolutionNode::Or { children } => {
                children.iter().all(SolutionNode::fetched)
            }
            SolutionNode::Sort { child, .. }
            | SolutionNode::Skip { child, .. }
            | SolutionNode::Limit { child, .. }
            | SolutionNode::Projection { child, .. }
            | SolutionNode::ShardingFilter { child } => child.fetched(),
        }
    }

    /// Whether this stage can supply the named field without a fetch.
    pub fn has_field(&self, field: &str) -> bool {
        match self {
            SolutionNode::CollectionScan { .. } => true,
            SolutionNode::IndexScan(isn) => match &isn.key_pattern {
                // A multikey index stores per-element keys, not the field.
                Value::Object(obj) => !isn.multikey && obj.contains_key(field),
                _ => false,
            },
            SolutionNode::Fetch { .. } => true,
            SolutionNode::MergeSort { children, .. } | SolutionNode::Or { children } => {
                children.iter().all(|c| c.has_field(field))
            }
            SolutionNode::Sort { child, .. }
            | SolutionNode::Skip { child, .. }
            | SolutionNode::Limit { child, .. }
            | SolutionNode::Projection { child, .. }
            | SolutionNode::ShardingFilter { child } => child.has_field(field),
        }
    }

    /// The sort orders this stage's output is known to satisfy.
    pub fn provided_sorts(&self) -> Vec<Value> {
        match self {
            SolutionNode::CollectionScan { .. } => Vec::new(),
            SolutionNode::IndexScan(isn) => vec![isn.provided_sort()],
            SolutionNode::MergeSort { sort, .. } => vec![sort.clone()],
            SolutionNode::Sort { pattern, .. } => vec![pattern.clone()],
            SolutionNode::Or { .. } => Vec::new(),
            SolutionNode::Fetch { child }
            | SolutionNode::Skip { child, .. }
            | SolutionNode::Limit { child, .. }
            | SolutionNode::Projection { child, .. }
            | SolutionNode::ShardingFilter { child } => child.provided_sorts(),
        }
    }

    /// Leaf count of the tree.
    pub fn num_leaves(&self) -> usize {
        match self {
            SolutionNode::CollectionScan { .. } | SolutionNode::IndexScan(_) => 1,
            SolutionNode::MergeSort { children, .. } | SolutionNode::Or { children } => {
                children.iter().map(SolutionNode::num_leaves).sum()
            }
            SolutionNode::Fetch { child }
            | SolutionNode::Sort { child, .. }
            | SolutionNode::Skip { child, .. }
            | SolutionNode::Limit { child, .. }
            | SolutionNode::Projection { child, .. }
            | SolutionNode::ShardingFilter { child } => child.num_leaves(),
        }
    }
}

/// Extracts the suffix of an index key pattern starting at `from`, as a
/// sort document.
pub fn key_pattern_suffix(key_pattern: &Value, from: usize) -> Value {
    let Value::Object(obj) = key_pattern else {
        return Value::Object(Map::new());
    };
    let mut suffix = Map::new();
    for (field, direction) in obj.iter().skip(from) {
        suffix.insert(field.clone(), direction.clone());
    }
    Value::Object(suffix)
}

/// A complete planned query: the stage tree plus the summary facts the
/// cache and the runner need.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySolution {
    pub root: SolutionNode,
    /// Whether a blocking sort stage was inserted
    pub has_sort_stage: bool,
    /// Namespace the plan targets
    pub ns: String,
    /// The filter the plan answers
    pub filter: Value,
    /// Serializable summary for the plan cache
    pub cache_data: Option<SolutionCacheData>,
}

impl QuerySolution {
    /// A collection scan solution, cacheable as such.
    pub fn collection_scan_solution(ns: impl Into<String>, filter: Value) -> Self {
        Self {
            root: SolutionNode::CollectionScan {
                direction: 1,
                filter: filter.clone(),
            },
            has_sort_stage: false,
            ns: ns.into(),
            filter,
            cache_data: Some(SolutionCacheData::collection_scan()),
        }
    }

    pub fn with_cache_data(mut self, cache_data: SolutionCacheData) -> Self {
        self.cache_data = Some(cache_data);
        self
    }
}
