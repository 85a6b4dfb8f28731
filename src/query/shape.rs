//! Shape key encoding
//!
//! The shape key is a compact string identifying the equivalence class of a
//! query: a preorder walk of the normalized predicate tree, followed by the
//! sort encoding, followed by the projection encoding. Two queries with the
//! same key are planned the same way, so the key is what the plan cache and
//! the allowed-indexes store are keyed on.

use serde_json::Value;

use super::expression::Expression;

/// Encodes the predicate-tree portion of a shape key: for every node in
/// preorder, the two-character match-type tag followed by the field path.
pub fn encode_expression_shape(root: &Expression) -> String {
    let mut out = String::new();
    encode_expression(root, &mut out);
    out
}

fn encode_expression(node: &Expression, out: &mut String) {
    out.push_str(node.match_type.shape_tag());
    out.push_str(&node.path);
    for child in &node.children {
        encode_expression(child, out);
    }
}

/// Encodes the sort document: one character per element (`a` ascending,
/// `d` descending, `t` text score) followed by the field name.
///
/// Directions that are neither numeric nor the text-score meta directive
/// encode as ascending.
pub fn encode_sort(sort: &Value, out: &mut String) {
    let Value::Object(obj) = sort else {
        return;
    };
    for (field, direction) in obj {
        if is_text_score_meta(direction) {
            out.push('t');
        } else if direction.as_f64().map_or(false, |d| d < 0.0) {
            out.push('d');
        } else {
            out.push('a');
        }
        out.push_str(field);
    }
}

/// Encodes a non-empty projection document: `p`, then per element the
/// element's compact value rendering followed by its field name.
pub fn encode_projection(projection: &Value, out: &mut String) {
    let Value::Object(obj) = projection else {
        return;
    };
    if obj.is_empty() {
        return;
    }
    out.push('p');
    for (field, value) in obj {
        let rendered =
            serde_json::to_string(value).expect("projection element serialization cannot fail");
        out.push_str(&rendered);
        out.push_str(field);
    }
}

/// Derives the full shape key over a normalized tree, sort, and projection.
pub fn encode_key(root: &Expression, sort: &Value, projection: &Value) -> String {
    let mut out = encode_expression_shape(root);
    encode_sort(sort, &mut out);
    encode_projection(projection, &mut out);
    out
}

fn is_text_score_meta(value: &Value) -> bool {
    value
        .as_object()
        .and_then(|obj| obj.get("$meta"))
        .and_then(Value::as_str)
        == Some("textScore")
}
