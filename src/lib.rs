//! talondb - a strict, deterministic, document-oriented database
//!
//! Query planning core: canonicalization, plan caching, pinned planning
//! advice, and post-planning analysis.

pub mod commands;
pub mod observability;
pub mod plan_cache;
pub mod planner;
pub mod query;
pub mod query_settings;
