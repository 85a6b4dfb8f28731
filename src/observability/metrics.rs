//! Metrics registry for the query core
//!
//! - Counters only (no gauges, no histograms)
//! - Monotonic increase
//! - Reset only on process start
//! - Thread-safe but lock-minimal

use std::sync::atomic::{AtomicU64, Ordering};

/// Operational counters for planning and caching.
///
/// # Thread Safety
///
/// All counters use atomic operations with Relaxed ordering: exact
/// cross-counter consistency is not needed for reporting.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Plans stored in the cache
    plans_cached: AtomicU64,
    /// Cache lookups that found an entry
    cache_hits: AtomicU64,
    /// Cache lookups that found nothing
    cache_misses: AtomicU64,
    /// Entries evicted by degraded execution feedback
    feedback_evictions: AtomicU64,
    /// Explicit cache clears
    cache_clears: AtomicU64,
    /// Cache clears triggered by the write-operation counter
    write_trigger_clears: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_plans_cached(&self) {
        self.plans_cached.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cache_misses(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_feedback_evictions(&self) {
        self.feedback_evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cache_clears(&self) {
        self.cache_clears.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_write_trigger_clears(&self) {
        self.write_trigger_clears.fetch_add(1, Ordering::Relaxed);
    }

    pub fn plans_cached(&self) -> u64 {
        self.plans_cached.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn feedback_evictions(&self) -> u64 {
        self.feedback_evictions.load(Ordering::Relaxed)
    }

    pub fn cache_clears(&self) -> u64 {
        self.cache_clears.load(Ordering::Relaxed)
    }

    pub fn write_trigger_clears(&self) -> u64 {
        self.write_trigger_clears.load(Ordering::Relaxed)
    }
}
