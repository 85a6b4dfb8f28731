//! Canonical queries
//!
//! A `QueryRequest` is the immutable bundle parsed off the wire. A
//! `CanonicalQuery` is the planner's view of it: the normalized and
//! validated predicate tree, the parsed projection, and the derived shape
//! key.

use std::fmt;

use serde_json::{json, Value};

use super::document::is_empty_doc;
use super::errors::QueryResult;
use super::expression::Expression;
use super::normalize::{normalize, validate};
use super::parser::parse_filter;
use super::projection::ParsedProjection;
use super::shape::encode_key;

/// The parsed form of an incoming query. Created once, immutable after.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    ns: String,
    filter: Value,
    sort: Value,
    projection: Value,
    skip: u64,
    num_to_return: u64,
    want_more: bool,
    hint: Option<Value>,
    min: Option<Value>,
    max: Option<Value>,
    snapshot: bool,
    batch_size: u64,
}

impl QueryRequest {
    /// Creates a request with no sort, projection, or limits.
    pub fn new(ns: impl Into<String>, filter: Value) -> Self {
        Self {
            ns: ns.into(),
            filter,
            sort: json!({}),
            projection: json!({}),
            skip: 0,
            num_to_return: 0,
            want_more: true,
            hint: None,
            min: None,
            max: None,
            snapshot: false,
            batch_size: 0,
        }
    }

    /// Sets the sort document.
    pub fn with_sort(mut self, sort: Value) -> Self {
        self.sort = sort;
        self
    }

    /// Sets the projection document.
    pub fn with_projection(mut self, projection: Value) -> Self {
        self.projection = projection;
        self
    }

    /// Sets the number of documents to skip.
    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    /// Sets a soft limit: the caller may still ask for more batches.
    pub fn with_limit(mut self, num_to_return: u64) -> Self {
        self.num_to_return = num_to_return;
        self.want_more = true;
        self
    }

    /// Sets a hard limit: the result set is cut off at `num_to_return`.
    pub fn with_hard_limit(mut self, num_to_return: u64) -> Self {
        self.num_to_return = num_to_return;
        self.want_more = false;
        self
    }

    /// Sets an index hint.
    pub fn with_hint(mut self, hint: Value) -> Self {
        self.hint = Some(hint);
        self
    }

    /// Sets the lower index key bound.
    pub fn with_min(mut self, min: Value) -> Self {
        self.min = Some(min);
        self
    }

    /// Sets the upper index key bound.
    pub fn with_max(mut self, max: Value) -> Self {
        self.max = Some(max);
        self
    }

    /// Requests snapshot isolation for the scan.
    pub fn with_snapshot(mut self, snapshot: bool) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Sets the batch size.
    pub fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn ns(&self) -> &str {
        &self.ns
    }

    pub fn filter(&self) -> &Value {
        &self.filter
    }

    pub fn sort(&self) -> &Value {
        &self.sort
    }

    pub fn projection(&self) -> &Value {
        &self.projection
    }

    pub fn skip(&self) -> u64 {
        self.skip
    }

    /// Limit on returned documents; 0 means unlimited.
    pub fn num_to_return(&self) -> u64 {
        self.num_to_return
    }

    /// False when the limit is hard (no further batches).
    pub fn want_more(&self) -> bool {
        self.want_more
    }

    pub fn hint(&self) -> Option<&Value> {
        self.hint.as_ref().filter(|h| !is_empty_doc(h))
    }

    pub fn min(&self) -> Option<&Value> {
        self.min.as_ref().filter(|m| !is_empty_doc(m))
    }

    pub fn max(&self) -> Option<&Value> {
        self.max.as_ref().filter(|m| !is_empty_doc(m))
    }

    pub fn snapshot(&self) -> bool {
        self.snapshot
    }

    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }
}

/// A query in canonical form: normalized tree, parsed projection, shape
/// key. Owns its tree and projection outright.
#[derive(Debug, Clone)]
pub struct CanonicalQuery {
    request: QueryRequest,
    root: Expression,
    projection: Option<ParsedProjection>,
    shape_key: String,
}

impl CanonicalQuery {
    /// Canonicalizes a request: parse the filter, normalize and validate
    /// the tree, parse the projection, derive the shape key. Failures leave
    /// no partial state behind.
    pub fn canonicalize(request: QueryRequest) -> QueryResult<CanonicalQuery> {
        let root = normalize(parse_filter(&request.filter)?);
        validate(&root)?;

        let projection = if is_empty_doc(&request.projection) {
            None
        } else {
            Some(ParsedProjection::make(&request.projection, &root)?)
        };

        let shape_key = encode_key(&root, &request.sort, &request.projection);

        Ok(CanonicalQuery {
            request,
            root,
            projection,
            shape_key,
        })
    }

    pub fn request(&self) -> &QueryRequest {
        &self.request
    }

    /// The normalized predicate tree.
    pub fn root(&self) -> &Expression {
        &self.root
    }

    pub fn parsed_projection(&self) -> Option<&ParsedProjection> {
        self.projection.as_ref()
    }

    /// The shape key identifying this query's equivalence class.
    pub fn shape_key(&self) -> &str {
        &self.shape_key
    }
}

impl fmt::Display for CanonicalQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ns={} limit={} skip={} key={}",
            self.request.ns, self.request.num_to_return, self.request.skip, self.shape_key
        )
    }
}

/// Detects queries of the form `{_id: <literal>}` which bypass planning
/// entirely. The `_id` value must not be an operator document or an array;
/// the only other fields allowed beside `_id` are `$atomic`/`$isolated`.
pub fn is_simple_id_query(filter: &Value) -> bool {
    let Value::Object(obj) = filter else {
        return false;
    };

    let mut has_id = false;
    for (field, value) in obj {
        if field == "_id" {
            match value {
                Value::Object(spec) => {
                    // A literal object is fine; an operator document is not.
                    if spec.keys().next().is_some_and(|k| k.starts_with('$')) {
                        return false;
                    }
                }
                Value::Array(_) => return false,
                _ => {}
            }
            has_id = true;
        } else if field != "$atomic" && field != "$isolated" {
            return false;
        }
    }

    has_id
}
