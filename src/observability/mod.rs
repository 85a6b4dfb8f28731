//! Observability subsystem
//!
//! Structured logging and deterministic metrics for the query core.
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on planning or caching decisions
//! 3. No async or background threads
//! 4. Deterministic output

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::MetricsRegistry;
