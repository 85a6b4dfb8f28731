//! Administrative command surface
//!
//! Commands operate on a collection's plan cache and allowed-indexes
//! store, take a structured command document, and resolve to a result
//! document (`{ok: 1, ...}` or `{ok: 0, code, errmsg}`). Authorization is
//! the caller's concern.

mod hints;
mod plan_cache_ops;
mod response;

pub use hints::{clear_hints, list_hints, set_hint};
pub use plan_cache_ops::{clear_plan_cache, drop_query_shape, list_plans, list_query_shapes};
pub use response::{error_document, ok_document};

use serde_json::Value;
use thiserror::Error;

use crate::plan_cache::PlanCache;
use crate::query::{CanonicalQuery, QueryError, QueryRequest, QueryResult};
use crate::query_settings::QuerySettings;

/// Command dispatch errors
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("no such command: {0}")]
    UnknownCommand(String),
}

impl CommandError {
    /// Numeric code used in result documents
    pub fn numeric(&self) -> i64 {
        match self {
            CommandError::UnknownCommand(_) => 59,
        }
    }
}

/// Dispatches a command by name against one collection's caches.
pub fn run_command(
    settings: &QuerySettings,
    plan_cache: &PlanCache,
    ns: &str,
    name: &str,
    cmd: &Value,
) -> Value {
    match name {
        "planCacheListHints" => list_hints(settings),
        "planCacheSetHint" => set_hint(settings, plan_cache, ns, cmd),
        "planCacheClearHints" => clear_hints(settings, plan_cache, ns, cmd),
        "planCacheListQueryShapes" => list_query_shapes(plan_cache),
        "planCacheClear" => clear_plan_cache(plan_cache),
        "planCacheDrop" => drop_query_shape(plan_cache, ns, cmd),
        "planCacheListPlans" => list_plans(plan_cache, ns, cmd),
        other => {
            let err = CommandError::UnknownCommand(other.to_string());
            error_document(err.numeric(), &err.to_string())
        }
    }
}

/// Canonicalizes the shape described by a command body: required object
/// `query`, optional object `sort` and `projection`.
pub(crate) fn canonicalize_command(ns: &str, cmd: &Value) -> QueryResult<CanonicalQuery> {
    let query = match cmd.get("query") {
        None => return Err(QueryError::bad_value("required field query missing")),
        Some(query @ Value::Object(_)) => query.clone(),
        Some(_) => {
            return Err(QueryError::bad_value("required field query must be an object"));
        }
    };

    let sort = match cmd.get("sort") {
        None => Value::Object(Default::default()),
        Some(sort @ Value::Object(_)) => sort.clone(),
        Some(_) => {
            return Err(QueryError::bad_value("optional field sort must be an object"));
        }
    };

    let projection = match cmd.get("projection") {
        None => Value::Object(Default::default()),
        Some(projection @ Value::Object(_)) => projection.clone(),
        Some(_) => {
            return Err(QueryError::bad_value(
                "optional field projection must be an object",
            ));
        }
    };

    let request = QueryRequest::new(ns, query)
        .with_sort(sort)
        .with_projection(projection);
    CanonicalQuery::canonicalize(request)
}
