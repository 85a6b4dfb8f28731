//! Command result documents
//!
//! Every administrative command resolves to a single document: successes
//! carry `ok: 1` plus the command's payload, failures carry `ok: 0` with
//! the numeric error code and message.

use serde_json::{Map, Value};

use crate::query::{QueryError, QueryResult};

/// Builds a success document: `{ok: 1, ...payload}`.
pub fn ok_document(payload: Map<String, Value>) -> Value {
    let mut doc = Map::new();
    doc.insert("ok".to_string(), Value::from(1));
    doc.extend(payload);
    Value::Object(doc)
}

/// Builds a failure document: `{ok: 0, code, errmsg}`.
pub fn error_document(code: i64, errmsg: &str) -> Value {
    let mut doc = Map::new();
    doc.insert("ok".to_string(), Value::from(0));
    doc.insert("code".to_string(), Value::from(code));
    doc.insert("errmsg".to_string(), Value::from(errmsg));
    Value::Object(doc)
}

/// Renders a command outcome into its result document.
pub fn render(result: QueryResult<Map<String, Value>>) -> Value {
    match result {
        Ok(payload) => ok_document(payload),
        Err(err) => render_error(&err),
    }
}

/// Renders a query error into a failure document.
pub fn render_error(err: &QueryError) -> Value {
    error_document(err.code().numeric(), err.message())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ok_document() {
        let mut payload = Map::new();
        payload.insert("hints".to_string(), json!([]));
        let doc = ok_document(payload);
        assert_eq!(doc["ok"], json!(1));
        assert_eq!(doc["hints"], json!([]));
    }

    #[test]
    fn test_error_document() {
        let doc = render_error(&QueryError::bad_value("bad input"));
        assert_eq!(doc["ok"], json!(0));
        assert_eq!(doc["code"], json!(2));
        assert_eq!(doc["errmsg"], json!("bad input"));
    }
}
