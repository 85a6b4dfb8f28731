//! Plan cache subsystem
//!
//! Stores the outcome of plan ranking per query shape so repeat queries
//! skip planning. See `cache` for the cache itself and `solution` for the
//! cached plan descriptors.

mod cache;
mod solution;

pub use cache::{
    CachedSolution, PlanCache, PlanFeedback, PlanRankingDecision, MAX_FEEDBACK,
    MAX_WRITE_OPERATIONS, STD_DEV_THRESHOLD,
};
pub use solution::{IndexEntryData, PlanCacheIndexTree, SolutionCacheData, SolutionType};
