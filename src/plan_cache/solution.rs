//! Cached plan descriptors
//!
//! A `SolutionCacheData` is a serializable summary of a ranked plan,
//! sufficient to rebuild the execution tree without re-planning. For
//! index-tagged plans it carries a `PlanCacheIndexTree`: a shadow of the
//! predicate tree whose leaves record the index assignment chosen during
//! planning.

use serde_json::Value;

/// Index metadata recorded with a tagged leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntryData {
    /// The index key pattern, e.g. `{a: 1, b: -1}`
    pub key_pattern: Value,
    /// Whether the index is multikey
    pub multikey: bool,
    /// Whether the index is sparse
    pub sparse: bool,
    /// Index name in the catalog
    pub name: String,
}

impl IndexEntryData {
    pub fn new(key_pattern: Value, name: impl Into<String>) -> Self {
        Self {
            key_pattern,
            multikey: false,
            sparse: false,
            name: name.into(),
        }
    }
}

/// A shadow of the predicate tree annotated with chosen indexes.
///
/// Interior nodes mirror the predicate tree's combinators; a leaf either
/// carries an index assignment plus its position within the compound key,
/// or is unassigned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanCacheIndexTree {
    /// Index assigned to this leaf, if any
    pub entry: Option<IndexEntryData>,
    /// Position of the predicate within the index's compound key
    pub index_pos: usize,
    /// Children, mirroring the predicate tree
    pub children: Vec<PlanCacheIndexTree>,
}

impl PlanCacheIndexTree {
    /// An unassigned node with no children.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns an index to this leaf.
    pub fn set_index_entry(&mut self, entry: IndexEntryData, index_pos: usize) {
        self.entry = Some(entry);
        self.index_pos = index_pos;
    }

    /// Indented rendering for diagnostics and the list-plans command.
    pub fn summary(&self, indents: usize) -> String {
        let pad = "-".repeat(3 * indents);
        if !self.children.is_empty() {
            let mut out = format!("{}Node\n", pad);
            for child in &self.children {
                out.push_str(&child.summary(indents + 1));
            }
            out
        } else {
            match &self.entry {
                Some(entry) => format!("{}Leaf {}, pos: {}\n", pad, entry.key_pattern, self.index_pos),
                None => format!("{}Leaf\n", pad),
            }
        }
    }
}

/// The kind of plan a cache entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionType {
    /// Full collection scan; nothing else required
    CollectionScan,
    /// Scan of an entire index, identified by key pattern and direction
    WholeIndexScan,
    /// Index-tagged expression tree
    TaggedExpression,
}

/// Serializable summary of one ranked plan.
#[derive(Debug, Clone, PartialEq)]
pub struct SolutionCacheData {
    pub solution_type: SolutionType,
    /// Present for whole-index and tagged plans; absent for collection scans
    pub tree: Option<PlanCacheIndexTree>,
    /// Scan direction for whole-index plans: 1 forward, -1 reverse
    pub whole_index_direction: i32,
    /// Whether an administrator-pinned index restriction shaped this plan
    pub admin_hint_applied: bool,
}

impl SolutionCacheData {
    /// A collection scan plan.
    pub fn collection_scan() -> Self {
        Self {
            solution_type: SolutionType::CollectionScan,
            tree: None,
            whole_index_direction: 1,
            admin_hint_applied: false,
        }
    }

    /// A whole-index scan plan.
    pub fn whole_index_scan(tree: PlanCacheIndexTree, direction: i32) -> Self {
        Self {
            solution_type: SolutionType::WholeIndexScan,
            tree: Some(tree),
            whole_index_direction: direction,
            admin_hint_applied: false,
        }
    }

    /// An index-tagged expression plan.
    pub fn tagged_expression(tree: PlanCacheIndexTree) -> Self {
        Self {
            solution_type: SolutionType::TaggedExpression,
            tree: Some(tree),
            whole_index_direction: 1,
            admin_hint_applied: false,
        }
    }

    /// One-line rendering for the list-plans command.
    pub fn summary(&self) -> String {
        match self.solution_type {
            SolutionType::CollectionScan => "(collection scan)".to_string(),
            SolutionType::WholeIndexScan => format!(
                "(whole index scan solution: dir={}; tree={})",
                self.whole_index_direction,
                self.tree.as_ref().map(|t| t.summary(0)).unwrap_or_default()
            ),
            SolutionType::TaggedExpression => format!(
                "(index-tagged expression tree: tree={})",
                self.tree.as_ref().map(|t| t.summary(0)).unwrap_or_default()
            ),
        }
    }
}
