//! Projection parsing
//!
//! A projection document is analyzed once at canonicalization time. The
//! planner only needs two facts from it: whether the full document has to
//! be fetched, and which fields a covered plan would have to supply.

use serde_json::Value;

use super::errors::{QueryError, QueryResult};
use super::expression::Expression;

/// Analyzed form of a projection document.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedProjection {
    requires_document: bool,
    required_fields: Vec<String>,
}

impl ParsedProjection {
    /// Parses and validates a projection document against the query's
    /// normalized predicate tree.
    pub fn make(projection: &Value, root: &Expression) -> QueryResult<ParsedProjection> {
        let obj = match projection {
            Value::Object(obj) => obj,
            _ => return Err(QueryError::bad_value("projection must be an object")),
        };

        let mut requires_document = false;
        let mut included: Vec<String> = Vec::new();
        let mut has_inclusion = false;
        let mut has_exclusion = false;
        let mut id_excluded = false;

        for (field, value) in obj {
            if let Value::Object(spec) = value {
                if spec.contains_key("$meta") {
                    // Meta projections are computed, not fetched.
                    continue;
                }
                if spec.contains_key("$slice") || spec.contains_key("$elemMatch") {
                    requires_document = true;
                    continue;
                }
                return Err(QueryError::bad_value(format!(
                    "unsupported projection option for field '{}'",
                    field
                )));
            }

            if field == "$" || field.ends_with(".$") {
                validate_positional(field, root)?;
                requires_document = true;
                has_inclusion = true;
                continue;
            }

            let include = projection_element_truthy(value);
            if field == "_id" {
                id_excluded = !include;
                continue;
            }

            if include {
                has_inclusion = true;
                included.push(field.clone());
            } else {
                has_exclusion = true;
            }
        }

        if has_inclusion && has_exclusion {
            return Err(QueryError::bad_value(
                "cannot mix inclusion and exclusion in a projection",
            ));
        }

        // An exclusion projection keeps everything except the named fields,
        // which only the full document can answer.
        if has_exclusion || (!has_inclusion && id_excluded) {
            return Ok(ParsedProjection {
                requires_document: true,
                required_fields: Vec::new(),
            });
        }

        let mut required_fields = included;
        if !id_excluded {
            required_fields.push("_id".to_string());
        }

        Ok(ParsedProjection {
            requires_document,
            required_fields,
        })
    }

    /// Whether answering the projection needs the full document.
    pub fn requires_document(&self) -> bool {
        self.requires_document
    }

    /// Fields a plan must supply for this projection to be covered.
    /// Meaningless when `requires_document()` is true.
    pub fn required_fields(&self) -> &[String] {
        &self.required_fields
    }
}

/// A positional projection must correspond to a predicate on the array
/// field it projects.
fn validate_positional(field: &str, root: &Expression) -> QueryResult<()> {
    let prefix = field.trim_end_matches(".$");
    if prefix.is_empty() || !tree_constrains_path(root, prefix) {
        return Err(QueryError::bad_value(format!(
            "positional projection '{}' does not match the query",
            field
        )));
    }
    Ok(())
}

fn tree_constrains_path(node: &Expression, prefix: &str) -> bool {
    if node.path == prefix || node.path.starts_with(&format!("{}.", prefix)) {
        return true;
    }
    node.children.iter().any(|c| tree_constrains_path(c, prefix))
}

fn projection_element_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |n| n != 0.0),
        _ => false,
    }
}
