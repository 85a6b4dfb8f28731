//! Filter document parsing
//!
//! Turns a filter document into a predicate expression tree. The parser is
//! shape-oriented: operands are carried opaquely on the leaves and never
//! evaluated. The tree it produces always has an AND root; normalization
//! collapses the root away when it has a single child.

use serde_json::{Map, Value};

use super::errors::{QueryError, QueryResult};
use super::expression::{Expression, MatchType};

/// Geo companion keys folded into the payload of the geo operator that owns
/// them rather than parsed as operators of their own.
const GEO_COMPANIONS: [&str; 3] = ["$maxDistance", "$uniqueDocs", "$options"];

/// Parses a filter document into an expression tree rooted at an AND.
///
/// The empty filter `{}` parses to an AND with no children.
pub fn parse_filter(filter: &Value) -> QueryResult<Expression> {
    let obj = match filter {
        Value::Object(obj) => obj,
        Value::Null => return Ok(Expression::and(Vec::new())),
        _ => return Err(QueryError::bad_value("filter must be an object")),
    };

    let mut children = Vec::new();
    for (key, value) in obj {
        if let Some(op) = key.strip_prefix('$') {
            match op {
                "and" | "or" | "nor" => {
                    children.push(parse_logical(key, value)?);
                }
                "not" => {
                    return Err(QueryError::bad_value("$not cannot be applied at top level"));
                }
                "where" => {
                    children.push(Expression::leaf(MatchType::Where, "", value.clone()));
                }
                "text" => {
                    children.push(parse_text(value)?);
                }
                "atomic" | "isolated" => {
                    children.push(Expression::leaf(MatchType::Atomic, "", value.clone()));
                }
                "comment" => {}
                _ => {
                    return Err(QueryError::bad_value(format!(
                        "unknown top-level operator: {}",
                        key
                    )));
                }
            }
        } else {
            children.extend(parse_field_predicate(key, value)?);
        }
    }

    Ok(Expression::and(children))
}

/// `$and` / `$or` / `$nor` take a non-empty array of filter documents.
fn parse_logical(key: &str, value: &Value) -> QueryResult<Expression> {
    let arr = match value {
        Value::Array(arr) if !arr.is_empty() => arr,
        _ => {
            return Err(QueryError::bad_value(format!(
                "{} must be a nonempty array",
                key
            )));
        }
    };

    let mut children = Vec::with_capacity(arr.len());
    for item in arr {
        if !item.is_object() {
            return Err(QueryError::bad_value(format!(
                "{} entries must be objects",
                key
            )));
        }
        children.push(parse_filter(item)?);
    }

    let match_type = match key {
        "$and" => MatchType::And,
        "$or" => MatchType::Or,
        _ => MatchType::Nor,
    };
    Ok(Expression::logical(match_type, children))
}

fn parse_text(value: &Value) -> QueryResult<Expression> {
    match value {
        Value::Object(obj) if obj.contains_key("$search") => {
            Ok(Expression::text(value.clone()))
        }
        _ => Err(QueryError::bad_value("$text requires a $search term")),
    }
}

/// Parses the predicate(s) on a single field. An operator document like
/// `{age: {$gt: 1, $lt: 5}}` yields one leaf per operator.
fn parse_field_predicate(path: &str, value: &Value) -> QueryResult<Vec<Expression>> {
    match value {
        Value::Object(obj) if is_operator_document(obj) => parse_operator_document(path, obj),
        // Anything else is a literal equality match, including `{}` and arrays.
        _ => Ok(vec![Expression::eq(path, value.clone())]),
    }
}

/// An object value is an operator document when its first key is an
/// operator. Mixing operator and plain keys in one document is rejected
/// later, in `parse_operator_document`.
fn is_operator_document(obj: &Map<String, Value>) -> bool {
    obj.keys().next().is_some_and(|k| k.starts_with('$'))
}

fn parse_operator_document(path: &str, obj: &Map<String, Value>) -> QueryResult<Vec<Expression>> {
    let mut nodes = Vec::new();

    for (key, operand) in obj {
        if !key.starts_with('$') {
            return Err(QueryError::bad_value(format!(
                "cannot mix operator and plain keys under field '{}'",
                path
            )));
        }
        match key.as_str() {
            "$eq" => nodes.push(Expression::eq(path, operand.clone())),
            "$lt" => nodes.push(Expression::leaf(MatchType::Lt, path, operand.clone())),
            "$lte" => nodes.push(Expression::leaf(MatchType::Lte, path, operand.clone())),
            "$gt" => nodes.push(Expression::leaf(MatchType::Gt, path, operand.clone())),
            "$gte" => nodes.push(Expression::leaf(MatchType::Gte, path, operand.clone())),
            "$ne" => nodes.push(Expression::not(Expression::eq(path, operand.clone()))),
            "$in" => nodes.push(parse_array_operator(MatchType::In, path, key, operand)?),
            "$nin" => nodes.push(parse_array_operator(MatchType::Nin, path, key, operand)?),
            "$all" => nodes.push(parse_array_operator(MatchType::All, path, key, operand)?),
            "$exists" => nodes.push(Expression::leaf(MatchType::Exists, path, operand.clone())),
            "$type" => nodes.push(Expression::leaf(MatchType::Type, path, operand.clone())),
            "$size" => nodes.push(Expression::leaf(MatchType::Size, path, operand.clone())),
            "$mod" => nodes.push(parse_mod(path, operand)?),
            "$regex" => nodes.push(parse_regex(path, operand, obj.get("$options"))),
            "$options" => {
                if !obj.contains_key("$regex") {
                    return Err(QueryError::bad_value("$options requires $regex"));
                }
                // Consumed by the $regex arm.
            }
            "$elemMatch" => nodes.push(parse_elem_match(path, operand)?),
            "$not" => nodes.push(parse_not(path, operand)?),
            "$maxDistance" | "$uniqueDocs" => {
                // Companions of a geo operator that may precede it in the
                // document; the geo arm consumes them.
                if !contains_geo_operator(obj) {
                    return Err(QueryError::bad_value(format!(
                        "{} requires a geo operator",
                        key
                    )));
                }
            }
            "$near" | "$geoNear" | "$nearSphere" => {
                nodes.push(Expression::geo_near(path, Value::Object(obj.clone())));
                // The rest of the document belongs to the geo operator.
                return finish_geo_document(nodes, obj, key);
            }
            "$within" | "$geoWithin" | "$geoIntersects" => {
                nodes.push(Expression::leaf(MatchType::Geo, path, Value::Object(obj.clone())));
                return finish_geo_document(nodes, obj, key);
            }
            _ => {
                return Err(QueryError::bad_value(format!("unknown operator: {}", key)));
            }
        }
    }

    Ok(nodes)
}

fn contains_geo_operator(obj: &Map<String, Value>) -> bool {
    ["$near", "$geoNear", "$nearSphere", "$within", "$geoWithin", "$geoIntersects"]
        .iter()
        .any(|op| obj.contains_key(*op))
}

/// A geo operator consumes its whole operator document; any keys other than
/// the operator itself and its companions are malformed.
fn finish_geo_document(
    nodes: Vec<Expression>,
    obj: &Map<String, Value>,
    geo_key: &str,
) -> QueryResult<Vec<Expression>> {
    for key in obj.keys() {
        if key != geo_key && !GEO_COMPANIONS.contains(&key.as_str()) {
            return Err(QueryError::bad_value(format!(
                "{} cannot be combined with {}",
                geo_key, key
            )));
        }
    }
    Ok(nodes)
}

fn parse_array_operator(
    match_type: MatchType,
    path: &str,
    key: &str,
    operand: &Value,
) -> QueryResult<Expression> {
    if !operand.is_array() {
        return Err(QueryError::bad_value(format!("{} requires an array", key)));
    }
    Ok(Expression::leaf(match_type, path, operand.clone()))
}

fn parse_mod(path: &str, operand: &Value) -> QueryResult<Expression> {
    match operand {
        Value::Array(arr) if arr.len() == 2 => {
            Ok(Expression::leaf(MatchType::Mod, path, operand.clone()))
        }
        _ => Err(QueryError::bad_value("$mod requires [divisor, remainder]")),
    }
}

fn parse_regex(path: &str, pattern: &Value, options: Option<&Value>) -> Expression {
    let mut payload = Map::new();
    payload.insert("pattern".to_string(), pattern.clone());
    if let Some(opts) = options {
        payload.insert("options".to_string(), opts.clone());
    }
    Expression::leaf(MatchType::Regex, path, Value::Object(payload))
}

/// `$elemMatch` has two forms: the value form (`{$elemMatch: {$gt: 5}}`)
/// constrains the array element itself; the object form
/// (`{$elemMatch: {b: 1}}`) is a filter over element documents.
fn parse_elem_match(path: &str, operand: &Value) -> QueryResult<Expression> {
    let obj = match operand {
        Value::Object(obj) => obj,
        _ => return Err(QueryError::bad_value("$elemMatch requires an object")),
    };

    if is_operator_document(obj) {
        let children = parse_operator_document("", obj)?;
        let mut node = Expression::leaf(MatchType::ElemMatchValue, path, Value::Null);
        node.children = children;
        Ok(node)
    } else {
        let child = parse_filter(operand)?;
        let mut node = Expression::leaf(MatchType::ElemMatchObject, path, Value::Null);
        node.children = vec![child];
        Ok(node)
    }
}

/// `$not` wraps the operators of its operand document. Multiple operators
/// are ANDed before negation.
fn parse_not(path: &str, operand: &Value) -> QueryResult<Expression> {
    let obj = match operand {
        Value::Object(obj) if is_operator_document(obj) => obj,
        _ => return Err(QueryError::bad_value("$not requires an operator document")),
    };
    let mut children = parse_operator_document(path, obj)?;
    let negated = if children.len() == 1 {
        children.remove(0)
    } else {
        Expression::and(children)
    };
    Ok(Expression::not(negated))
}
