//! Document helpers
//!
//! Sort documents and index key patterns are order-significant: `{a: 1,
//! b: 1}` and `{b: 1, a: 1}` are different sort orders even though they
//! are equal as maps. The helpers here compare and transform documents
//! with field order taken into account.

use serde_json::{Map, Value};

/// Order-sensitive structural equality. Objects are equal only when their
/// fields appear in the same order with equal values.
pub fn ordered_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|((ka, va), (kb, vb))| ka == kb && ordered_eq(va, vb))
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| ordered_eq(x, y))
        }
        _ => a == b,
    }
}

/// Reverses a sort pattern by negating every numeric direction.
pub fn reverse_sort_document(sort: &Value) -> Value {
    let Value::Object(obj) = sort else {
        return sort.clone();
    };
    let mut reversed = Map::new();
    for (field, direction) in obj {
        let flipped = match direction.as_f64() {
            Some(d) if d < 0.0 => Value::from(1),
            Some(_) => Value::from(-1),
            None => direction.clone(),
        };
        reversed.insert(field.clone(), flipped);
    }
    Value::Object(reversed)
}

/// Whether a sort document requests natural (insertion) order.
pub fn is_natural_sort(sort: &Value) -> bool {
    sort.as_object().map_or(false, |obj| obj.contains_key("$natural"))
}

/// True for a missing or `{}` document.
pub fn is_empty_doc(doc: &Value) -> bool {
    match doc {
        Value::Null => true,
        Value::Object(obj) => obj.is_empty(),
        _ => false,
    }
}
