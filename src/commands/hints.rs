//! Hint commands
//!
//! Administrative operations on the allowed-indexes store. Setting or
//! clearing a hint always evicts the matching plan cache entry so the next
//! planning pass sees the new restriction.

use serde_json::{Map, Value};

use crate::observability::{Event, Logger};
use crate::plan_cache::PlanCache;
use crate::query::{CanonicalQuery, QueryError, QueryRequest, QueryResult};
use crate::query_settings::QuerySettings;

use super::canonicalize_command;
use super::response::render;

/// Lists every pinned shape: `{ok: 1, hints: [{query, sort, projection,
/// indexes}, ...]}`. Empty when nothing is pinned.
pub fn list_hints(settings: &QuerySettings) -> Value {
    let mut hints = Vec::new();
    for entry in settings.get_all_allowed_indices() {
        let mut hint = Map::new();
        hint.insert("query".to_string(), entry.query);
        hint.insert("sort".to_string(), entry.sort);
        hint.insert("projection".to_string(), entry.projection);
        hint.insert(
            "indexes".to_string(),
            Value::Array(entry.index_key_patterns),
        );
        hints.push(Value::Object(hint));
    }

    let mut payload = Map::new();
    payload.insert("hints".to_string(), Value::Array(hints));
    render(Ok(payload))
}

/// Pins the allowed indexes for a shape. Overrides any existing entry and
/// evicts the shape's plan cache entry.
///
/// The command body requires `indexes` (non-empty array of non-empty
/// objects) and `query` (object); `sort` and `projection` are optional.
pub fn set_hint(
    settings: &QuerySettings,
    plan_cache: &PlanCache,
    ns: &str,
    cmd: &Value,
) -> Value {
    render(run_set_hint(settings, plan_cache, ns, cmd))
}

fn run_set_hint(
    settings: &QuerySettings,
    plan_cache: &PlanCache,
    ns: &str,
    cmd: &Value,
) -> QueryResult<Map<String, Value>> {
    let indexes = parse_indexes(cmd)?;
    let query = canonicalize_command(ns, cmd)?;

    settings.set_allowed_indices(&query, indexes)?;

    // Plans computed without the restriction are stale now.
    evict_shape(plan_cache, &query);
    Logger::info(Event::HintSet.as_str(), &[("key", query.shape_key())]);

    Ok(Map::new())
}

fn parse_indexes(cmd: &Value) -> QueryResult<Vec<Value>> {
    let indexes = match cmd.get("indexes") {
        None => return Err(QueryError::bad_value("required field indexes missing")),
        Some(Value::Array(arr)) => arr,
        Some(_) => {
            return Err(QueryError::bad_value(
                "required field indexes must be an array",
            ));
        }
    };
    if indexes.is_empty() {
        return Err(QueryError::bad_value(
            "required field indexes must contain at least one index",
        ));
    }
    for index in indexes {
        match index {
            Value::Object(obj) if obj.is_empty() => {
                return Err(QueryError::bad_value("index specification cannot be empty"));
            }
            Value::Object(_) => {}
            _ => {
                return Err(QueryError::bad_value(
                    "each item in indexes must be an object",
                ));
            }
        }
    }
    Ok(indexes.clone())
}

/// Clears hints. With a `query` field (plus optional `sort` and
/// `projection`), clears one shape; with none of the three, clears every
/// shape. A missing entry is not an error.
pub fn clear_hints(
    settings: &QuerySettings,
    plan_cache: &PlanCache,
    ns: &str,
    cmd: &Value,
) -> Value {
    render(run_clear_hints(settings, plan_cache, ns, cmd))
}

fn run_clear_hints(
    settings: &QuerySettings,
    plan_cache: &PlanCache,
    ns: &str,
    cmd: &Value,
) -> QueryResult<Map<String, Value>> {
    if cmd.get("query").is_some() {
        let query = canonicalize_command(ns, cmd)?;
        settings.remove_allowed_indices(&query);
        evict_shape(plan_cache, &query);
        Logger::info(Event::HintCleared.as_str(), &[("key", query.shape_key())]);
        return Ok(Map::new());
    }

    // Without a query, sort and projection are meaningless; rejecting them
    // avoids clearing everything because a caller forgot the query field.
    if cmd.get("sort").is_some() || cmd.get("projection").is_some() {
        return Err(QueryError::bad_value("sort or projection provided without query"));
    }

    // Snapshot the store before clearing: the entries are the only source
    // of the payloads needed to reconstruct each shape key.
    let entries = settings.get_all_allowed_indices();
    settings.clear_allowed_indices();

    for entry in entries {
        let request = QueryRequest::new(ns, entry.query)
            .with_sort(entry.sort)
            .with_projection(entry.projection);
        let query = CanonicalQuery::canonicalize(request).map_err(|e| {
            QueryError::internal(format!("stored hint no longer canonicalizes: {}", e))
        })?;
        evict_shape(plan_cache, &query);
    }

    Logger::info(Event::HintsCleared.as_str(), &[]);
    Ok(Map::new())
}

/// Removes a shape's plan cache entry. The shape may never have been
/// planned, so an absent key is fine.
fn evict_shape(plan_cache: &PlanCache, query: &CanonicalQuery) {
    let _ = plan_cache.remove(query);
}
