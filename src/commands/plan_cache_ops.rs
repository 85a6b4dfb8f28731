//! Plan cache commands
//!
//! Administrative introspection and maintenance of a collection's plan
//! cache.

use serde_json::{Map, Value};

use crate::plan_cache::PlanCache;
use crate::query::QueryResult;

use super::canonicalize_command;
use super::response::render;

/// Lists every cached shape: `{ok: 1, shapes: [{query, sort, projection},
/// ...]}`.
pub fn list_query_shapes(plan_cache: &PlanCache) -> Value {
    let mut shapes = Vec::new();
    for solution in plan_cache.get_all_solutions() {
        let mut shape = Map::new();
        shape.insert("query".to_string(), solution.query);
        shape.insert("sort".to_string(), solution.sort);
        shape.insert("projection".to_string(), solution.projection);
        shapes.push(Value::Object(shape));
    }

    let mut payload = Map::new();
    payload.insert("shapes".to_string(), Value::Array(shapes));
    render(Ok(payload))
}

/// Drops every cached plan.
pub fn clear_plan_cache(plan_cache: &PlanCache) -> Value {
    plan_cache.clear();
    render(Ok(Map::new()))
}

/// Drops one shape from the cache. The command body is a shape
/// description: required `query`, optional `sort` and `projection`.
pub fn drop_query_shape(plan_cache: &PlanCache, ns: &str, cmd: &Value) -> Value {
    render(run_drop_query_shape(plan_cache, ns, cmd))
}

fn run_drop_query_shape(
    plan_cache: &PlanCache,
    ns: &str,
    cmd: &Value,
) -> QueryResult<Map<String, Value>> {
    let query = canonicalize_command(ns, cmd)?;
    plan_cache.remove(&query)?;
    Ok(Map::new())
}

/// Lists the cached plans for one shape: `{ok: 1, plans: [{details,
/// reason, feedback, hint}, ...]}`.
pub fn list_plans(plan_cache: &PlanCache, ns: &str, cmd: &Value) -> Value {
    render(run_list_plans(plan_cache, ns, cmd))
}

fn run_list_plans(
    plan_cache: &PlanCache,
    ns: &str,
    cmd: &Value,
) -> QueryResult<Map<String, Value>> {
    let query = canonicalize_command(ns, cmd)?;
    let cached = plan_cache.get(&query)?;

    let mut plans = Vec::with_capacity(cached.planner_data.len());
    for data in &cached.planner_data {
        let mut plan = Map::new();

        let mut details = Map::new();
        details.insert("solution".to_string(), Value::from(data.summary()));
        plan.insert("details".to_string(), Value::Object(details));

        plan.insert("reason".to_string(), Value::Object(Map::new()));
        plan.insert("feedback".to_string(), Value::Object(Map::new()));
        plan.insert("hint".to_string(), Value::from(data.admin_hint_applied));
        plans.push(Value::Object(plan));
    }

    let mut payload = Map::new();
    payload.insert("plans".to_string(), Value::Array(plans));
    Ok(payload)
}
