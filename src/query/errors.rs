//! Query subsystem error types
//!
//! Error codes:
//! - BAD_VALUE - malformed input, or a shape key absent from a cache
//! - INTERNAL_ERROR - a planner post-condition failed
//!
//! All failures are reported through `Result`; nothing in the query core
//! panics on user input.

use std::fmt;

/// Machine-readable query error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorCode {
    /// Malformed input: empty required field, wrong type, unknown operator,
    /// or a key not present in a cache
    BadValue,
    /// A planner post-condition failed
    InternalError,
}

impl QueryErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            QueryErrorCode::BadValue => "BAD_VALUE",
            QueryErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Numeric code used in command result documents
    pub fn numeric(&self) -> i64 {
        match self {
            QueryErrorCode::InternalError => 1,
            QueryErrorCode::BadValue => 2,
        }
    }
}

impl fmt::Display for QueryErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Query error with code and message
#[derive(Debug, Clone, PartialEq)]
pub struct QueryError {
    code: QueryErrorCode,
    message: String,
}

impl QueryError {
    /// Create a bad value error
    pub fn bad_value(message: impl Into<String>) -> Self {
        Self {
            code: QueryErrorCode::BadValue,
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: QueryErrorCode::InternalError,
            message: message.into(),
        }
    }

    /// Returns the error code
    pub fn code(&self) -> QueryErrorCode {
        self.code
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl std::error::Error for QueryError {}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
