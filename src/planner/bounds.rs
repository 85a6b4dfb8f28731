//! Index bounds
//!
//! The bounds of an index scan are, per indexed field, an ordered list of
//! intervals over the key space. Key-space extremes use the extended
//! `$minKey` / `$maxKey` documents.

use serde_json::{json, Value};

/// The smallest value in the index key space.
pub fn min_key() -> Value {
    json!({"$minKey": 1})
}

/// The largest value in the index key space.
pub fn max_key() -> Value {
    json!({"$maxKey": 1})
}

/// One interval over a single indexed field.
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    pub start: Value,
    pub end: Value,
    pub start_inclusive: bool,
    pub end_inclusive: bool,
}

impl Interval {
    /// The degenerate interval holding exactly one value.
    pub fn point(value: Value) -> Self {
        Self {
            start: value.clone(),
            end: value,
            start_inclusive: true,
            end_inclusive: true,
        }
    }

    /// The interval covering the whole key space.
    pub fn full() -> Self {
        Self {
            start: min_key(),
            end: max_key(),
            start_inclusive: true,
            end_inclusive: true,
        }
    }

    /// A general interval.
    pub fn range(start: Value, end: Value, start_inclusive: bool, end_inclusive: bool) -> Self {
        Self {
            start,
            end,
            start_inclusive,
            end_inclusive,
        }
    }

    /// Whether this interval holds exactly one value.
    pub fn is_point(&self) -> bool {
        self.start_inclusive && self.end_inclusive && self.start == self.end
    }

    /// Swaps the endpoints, for reversed scans.
    pub fn reverse(&mut self) {
        std::mem::swap(&mut self.start, &mut self.end);
        std::mem::swap(&mut self.start_inclusive, &mut self.end_inclusive);
    }
}

/// The ordered intervals scanned for one indexed field.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedIntervalList {
    /// Field name in the index key pattern
    pub name: String,
    pub intervals: Vec<Interval>,
}

impl OrderedIntervalList {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            intervals: Vec::new(),
        }
    }

    pub fn with_intervals(name: impl Into<String>, intervals: Vec<Interval>) -> Self {
        Self {
            name: name.into(),
            intervals,
        }
    }

    /// Whether every interval in the list is a point.
    pub fn is_union_of_points(&self) -> bool {
        self.intervals.iter().all(Interval::is_point)
    }

    /// Reverses the scan order of the list.
    pub fn reverse(&mut self) {
        self.intervals.reverse();
        for interval in &mut self.intervals {
            interval.reverse();
        }
    }
}

/// Bounds for an index scan: one interval list per key pattern field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexBounds {
    pub fields: Vec<OrderedIntervalList>,
    /// Set when the bounds are a single contiguous range over the whole
    /// key rather than per-field interval lists.
    pub is_simple_range: bool,
}

impl IndexBounds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reverses every field's interval list, for reversed scans.
    pub fn reverse(&mut self) {
        for field in &mut self.fields {
            field.reverse();
        }
    }
}
