//! Structured JSON logger
//!
//! - One log line = one event
//! - `event` and `severity` first, remaining fields alphabetical
//! - Synchronous, no buffering

use std::fmt;
use std::io::{self, Write};

use serde_json::{Map, Value};

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Planner-internal detail
    Trace = 0,
    /// Normal operations
    Info = 1,
    /// Recoverable issues
    Warn = 2,
    /// Operation failures
    Error = 3,
}

impl Severity {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Synchronous structured logger. Events go to stdout; errors to stderr.
///
/// Log lines are documents serialized the same way as every other document
/// in the crate, so field values need no escaping rules of their own.
pub struct Logger;

impl Logger {
    /// Log an event with the given severity and fields.
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        let line = Self::render(severity, event, fields);
        if severity == Severity::Error {
            let mut err = io::stderr();
            let _ = writeln!(err, "{}", line);
            let _ = err.flush();
        } else {
            let mut out = io::stdout();
            let _ = writeln!(out, "{}", line);
            let _ = out.flush();
        }
    }

    /// Renders one event as a compact JSON document: `event` first, then
    /// `severity`, then the fields in alphabetical order.
    fn render(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
        let mut doc = Map::new();
        doc.insert("event".to_string(), Value::from(event));
        doc.insert("severity".to_string(), Value::from(severity.as_str()));

        let mut sorted_fields: Vec<_> = fields.to_vec();
        sorted_fields.sort_by_key(|(key, _)| *key);
        for (key, value) in sorted_fields {
            doc.insert(key.to_string(), Value::from(value));
        }

        serde_json::to_string(&Value::Object(doc)).expect("log line serialization cannot fail")
    }

    /// Log at TRACE level
    pub fn trace(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Trace, event, fields);
    }

    /// Log at INFO level
    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    /// Log at WARN level
    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    /// Log at ERROR level
    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Error, event, fields);
    }
}
