//! Allowed-indexes store ("query settings")
//!
//! Maps a query shape to an administrator-supplied list of index key
//! patterns. When an entry exists for a shape, planning considers only
//! those indexes. Entries are set and cleared by the hint commands; any
//! change to an entry is paired (by the caller) with eviction of the
//! matching plan cache entry so the next planning pass sees the new
//! restriction.
//!
//! # Concurrency
//!
//! A single mutex protects the key-to-entry map, so the store may be
//! mutated from contexts that hold only a shared collection lock: the
//! store serializes itself.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde_json::Value;

use crate::planner::IndexInfo;
use crate::query::{ordered_eq, CanonicalQuery, QueryError, QueryResult};

/// One pinned shape: the payloads that reproduce it, and the indexes
/// planning may consider for it.
#[derive(Debug, Clone, PartialEq)]
pub struct AllowedIndexEntry {
    /// Original filter document
    pub query: Value,
    /// Original sort document
    pub sort: Value,
    /// Original projection document
    pub projection: Value,
    /// Candidate index key patterns, in the order supplied
    pub index_key_patterns: Vec<Value>,
}

/// Per-collection store of allowed-index restrictions, keyed by shape.
#[derive(Debug, Default)]
pub struct QuerySettings {
    entries: Mutex<HashMap<String, AllowedIndexEntry>>,
}

impl QuerySettings {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the allowed indexes for the query's shape.
    ///
    /// The list must be non-empty and every pattern a non-empty object.
    pub fn set_allowed_indices(
        &self,
        query: &CanonicalQuery,
        indexes: Vec<Value>,
    ) -> QueryResult<()> {
        if indexes.is_empty() {
            return Err(QueryError::bad_value(
                "allowed indexes must contain at least one index",
            ));
        }
        for index in &indexes {
            match index {
                Value::Object(obj) if !obj.is_empty() => {}
                Value::Object(_) => {
                    return Err(QueryError::bad_value("index specification cannot be empty"));
                }
                _ => {
                    return Err(QueryError::bad_value("each index must be an object"));
                }
            }
        }

        let request = query.request();
        let entry = AllowedIndexEntry {
            query: request.filter().clone(),
            sort: request.sort().clone(),
            projection: request.projection().clone(),
            index_key_patterns: indexes,
        };

        let mut entries = self.lock_entries();
        entries.insert(query.shape_key().to_string(), entry);
        Ok(())
    }

    /// The allowed key patterns for the query's shape, if pinned.
    pub fn get_allowed_indices(&self, query: &CanonicalQuery) -> Option<Vec<Value>> {
        let entries = self.lock_entries();
        entries
            .get(query.shape_key())
            .map(|e| e.index_key_patterns.clone())
    }

    /// Erases the entry for the query's shape. Absence is not an error.
    pub fn remove_allowed_indices(&self, query: &CanonicalQuery) {
        let mut entries = self.lock_entries();
        entries.remove(query.shape_key());
    }

    /// Snapshot of every entry.
    pub fn get_all_allowed_indices(&self) -> Vec<AllowedIndexEntry> {
        let entries = self.lock_entries();
        entries.values().cloned().collect()
    }

    /// Erases every entry.
    pub fn clear_allowed_indices(&self) {
        let mut entries = self.lock_entries();
        entries.clear();
    }

    /// Number of pinned shapes.
    pub fn size(&self) -> usize {
        self.lock_entries().len()
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, AllowedIndexEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Restricts a candidate index list to the allowed key patterns, keeping
/// only exact (order-sensitive) pattern matches.
pub fn filter_allowed_indexes(allowed: &[Value], indexes: &mut Vec<IndexInfo>) {
    indexes.retain(|index| {
        allowed
            .iter()
            .any(|pattern| ordered_eq(&index.key_pattern, pattern))
    });
}
