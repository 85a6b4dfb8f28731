//! Observable events in the query core
//!
//! Events are explicit and typed; the logger receives their string form.

use std::fmt;

/// Observable events emitted by the query planning core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Plan cache
    /// A cached plan was found for a shape
    PlanCacheHit,
    /// No cached plan for a shape
    PlanCacheMiss,
    /// A ranked plan was stored
    PlanCached,
    /// An entry was evicted after execution feedback degraded
    PlanCacheEvict,
    /// The cache was cleared explicitly
    PlanCacheClear,
    /// The cache was cleared after the write-operation threshold
    PlanCacheWriteClear,

    // Allowed indexes
    /// An allowed-indexes entry was set for a shape
    HintSet,
    /// An allowed-indexes entry was removed
    HintCleared,
    /// All allowed-indexes entries were removed
    HintsCleared,

    // Planner analysis
    /// An index scan was exploded into a merge sort to satisfy a sort
    SortExploded,
    /// Explosion was refused (scan count over the cap)
    SortExplosionRefused,
}

impl Event {
    /// Returns the event name used in log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::PlanCacheHit => "PLAN_CACHE_HIT",
            Event::PlanCacheMiss => "PLAN_CACHE_MISS",
            Event::PlanCached => "PLAN_CACHED",
            Event::PlanCacheEvict => "PLAN_CACHE_EVICT",
            Event::PlanCacheClear => "PLAN_CACHE_CLEAR",
            Event::PlanCacheWriteClear => "PLAN_CACHE_WRITE_CLEAR",
            Event::HintSet => "HINT_SET",
            Event::HintCleared => "HINT_CLEARED",
            Event::HintsCleared => "HINTS_CLEARED",
            Event::SortExploded => "SORT_EXPLODED",
            Event::SortExplosionRefused => "SORT_EXPLOSION_REFUSED",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
