//! The plan cache
//!
//! Maps query shape keys to reusable plan descriptors. Entries are created
//! when ranking produces a cacheable winner, replaced on re-planning,
//! removed individually by explicit remove or degraded execution feedback,
//! and removed en masse by explicit clear or by the collection write
//! counter reaching its threshold.
//!
//! # Concurrency
//!
//! A single mutex protects the key-to-entry map. Everything returned to a
//! caller is deep-cloned while the mutex is held, so callers never alias
//! in-cache state. The write-operation counter is atomic; only a threshold
//! crossing takes the mutex.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use serde_json::Value;

use crate::observability::{Event, Logger, MetricsRegistry};
use crate::planner::QuerySolution;
use crate::query::{is_empty_doc, CanonicalQuery, QueryError, QueryResult};

use super::solution::SolutionCacheData;

/// One post-execution measurement fed back to the cache.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanFeedback {
    /// Score of the completed execution, comparable to ranking scores
    pub score: f64,
}

impl PlanFeedback {
    pub fn new(score: f64) -> Self {
        Self { score }
    }
}

/// The ranking outcome stored alongside a cached plan.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanRankingDecision {
    /// The winner's score
    pub score: f64,
    /// Scores of every ranked candidate, winner first
    pub candidate_scores: Vec<f64>,
}

impl PlanRankingDecision {
    pub fn new(score: f64) -> Self {
        Self {
            score,
            candidate_scores: vec![score],
        }
    }

    pub fn with_candidate_scores(mut self, scores: Vec<f64>) -> Self {
        self.candidate_scores = scores;
        self
    }
}

/// One cached shape: plan descriptors, the payloads that reproduce the
/// shape, the ranking decision, and bounded execution feedback.
#[derive(Debug, Clone)]
struct PlanCacheEntry {
    /// Plan descriptors, winner first
    planner_data: Vec<SolutionCacheData>,
    /// Original filter document
    query: Value,
    /// Original sort document
    sort: Value,
    /// Original projection document
    projection: Value,
    /// Why the winner won
    decision: PlanRankingDecision,
    /// Index into `planner_data` of the first alternative without a
    /// blocking sort, when the winner has one
    backup_soln: Option<usize>,
    /// Execution feedback, at most `MAX_FEEDBACK` records
    feedback: Vec<PlanFeedback>,
    /// Frozen feedback baseline, computed once when feedback fills up
    average_score: Option<f64>,
    stddev_score: Option<f64>,
}

/// Bound on stored feedback records per entry.
pub const MAX_FEEDBACK: usize = 20;

/// How many standard deviations of drift evict an entry.
pub const STD_DEV_THRESHOLD: f64 = 2.0;

/// A deep-cloned view of a cache entry handed to callers. Holds no
/// references into the cache.
#[derive(Debug, Clone)]
pub struct CachedSolution {
    key: String,
    /// Plan descriptors, winner first
    pub planner_data: Vec<SolutionCacheData>,
    /// First non-blocking-sort alternative, if the winner sorts
    pub backup_soln: Option<usize>,
    /// Original filter document
    pub query: Value,
    /// Original sort document
    pub sort: Value,
    /// Original projection document
    pub projection: Value,
}

impl CachedSolution {
    fn new(key: &str, entry: &PlanCacheEntry) -> Self {
        Self {
            key: key.to_string(),
            planner_data: entry.planner_data.clone(),
            backup_soln: entry.backup_soln,
            query: entry.query.clone(),
            sort: entry.sort.clone(),
            projection: entry.projection.clone(),
        }
    }

    /// The shape key this solution was cached under.
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Per-collection cache of ranked plans, keyed by query shape.
#[derive(Debug, Default)]
pub struct PlanCache {
    entries: Mutex<HashMap<String, PlanCacheEntry>>,
    write_operations: AtomicU64,
    metrics: MetricsRegistry,
}

/// Writes observed on the host collection before the cache clears itself.
pub const MAX_WRITE_OPERATIONS: u64 = 1000;

impl PlanCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a canonical query is eligible for plan caching.
    ///
    /// Not cacheable: no-predicate, no-sort collection scans; hinted
    /// queries; queries with min or max index key bounds.
    pub fn should_cache(query: &CanonicalQuery) -> bool {
        let request = query.request();

        if is_empty_doc(request.sort()) && query.root().is_empty_and() {
            return false;
        }

        // Hinted queries, and the min/max special cases of hinting, pin
        // the index choice; caching would bypass the pin.
        if request.hint().is_some() {
            return false;
        }
        if request.min().is_some() {
            return false;
        }
        if request.max().is_some() {
            return false;
        }

        true
    }

    /// Inserts or replaces the entry for the query's shape.
    ///
    /// `solutions` is the ranked candidate list, winner first. Each must
    /// carry cache data. If the winner has a blocking sort, the first
    /// alternative without one is recorded as the backup solution.
    pub fn add(
        &self,
        query: &CanonicalQuery,
        solutions: &[QuerySolution],
        decision: PlanRankingDecision,
    ) -> QueryResult<()> {
        if solutions.is_empty() {
            return Err(QueryError::bad_value("no solutions provided"));
        }

        let mut planner_data = Vec::with_capacity(solutions.len());
        for solution in solutions {
            let data = solution
                .cache_data
                .as_ref()
                .ok_or_else(|| QueryError::internal("solution has no cache data"))?;
            planner_data.push(data.clone());
        }

        let mut backup_soln = None;
        if solutions[0].has_sort_stage {
            backup_soln = solutions
                .iter()
                .position(|s| !s.has_sort_stage)
                .filter(|&i| i > 0);
        }

        let request = query.request();
        let entry = PlanCacheEntry {
            planner_data,
            query: request.filter().clone(),
            sort: request.sort().clone(),
            projection: request.projection().clone(),
            decision,
            backup_soln,
            feedback: Vec::new(),
            average_score: None,
            stddev_score: None,
        };

        let mut entries = self.lock_entries()?;
        entries.insert(query.shape_key().to_string(), entry);
        self.metrics.increment_plans_cached();
        Logger::trace(Event::PlanCached.as_str(), &[("key", query.shape_key())]);

        Ok(())
    }

    /// Looks up the query's shape, returning a deep-cloned solution.
    pub fn get(&self, query: &CanonicalQuery) -> QueryResult<CachedSolution> {
        let entries = self.lock_entries()?;
        match entries.get(query.shape_key()) {
            Some(entry) => {
                self.metrics.increment_cache_hits();
                Logger::trace(Event::PlanCacheHit.as_str(), &[("key", query.shape_key())]);
                Ok(CachedSolution::new(query.shape_key(), entry))
            }
            None => {
                self.metrics.increment_cache_misses();
                Logger::trace(Event::PlanCacheMiss.as_str(), &[("key", query.shape_key())]);
                Err(QueryError::bad_value("no such key in cache"))
            }
        }
    }

    /// Records execution feedback for the query's shape.
    ///
    /// Until `MAX_FEEDBACK` records exist the feedback is stored. After
    /// that, each record is tested against the frozen baseline: the entry
    /// is evicted when performance has degraded, and the record is
    /// discarded either way.
    pub fn feedback(&self, query: &CanonicalQuery, feedback: PlanFeedback) -> QueryResult<()> {
        let mut entries = self.lock_entries()?;
        let Some(entry) = entries.get_mut(query.shape_key()) else {
            return Err(QueryError::bad_value("no such key in cache"));
        };

        if entry.feedback.len() >= MAX_FEEDBACK {
            if has_plan_performance_degraded(entry, &feedback) {
                entries.remove(query.shape_key());
                self.metrics.increment_feedback_evictions();
                Logger::info(
                    Event::PlanCacheEvict.as_str(),
                    &[("key", query.shape_key())],
                );
            }
        } else {
            entry.feedback.push(feedback);
        }

        Ok(())
    }

    /// Erases the entry for the query's shape.
    pub fn remove(&self, query: &CanonicalQuery) -> QueryResult<()> {
        let mut entries = self.lock_entries()?;
        if entries.remove(query.shape_key()).is_none() {
            return Err(QueryError::bad_value("no such key in cache"));
        }
        Ok(())
    }

    /// Erases every entry and resets the write counter.
    pub fn clear(&self) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries.clear();
        self.write_operations.store(0, Ordering::SeqCst);
        self.metrics.increment_cache_clears();
        Logger::info(Event::PlanCacheClear.as_str(), &[]);
    }

    /// Snapshot of every cached solution, deep-cloned.
    pub fn get_all_solutions(&self) -> Vec<CachedSolution> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .map(|(key, entry)| CachedSolution::new(key, entry))
            .collect()
    }

    /// Number of cached shapes.
    pub fn size(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Notes one write operation on the host collection. Crossing the
    /// threshold clears the cache; racing crossings merely clear twice.
    pub fn notify_of_write_op(&self) {
        if self.write_operations.fetch_add(1, Ordering::SeqCst) + 1 < MAX_WRITE_OPERATIONS {
            return;
        }
        self.metrics.increment_write_trigger_clears();
        Logger::info(Event::PlanCacheWriteClear.as_str(), &[]);
        self.clear();
    }

    /// Counters for this cache.
    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    fn lock_entries(&self) -> QueryResult<std::sync::MutexGuard<'_, HashMap<String, PlanCacheEntry>>> {
        self.entries
            .lock()
            .map_err(|_| QueryError::internal("plan cache lock poisoned"))
    }
}

/// The degradation test.
///
/// On the first call for a full entry, computes the mean and sample
/// standard deviation (N−1) of the stored feedback scores. The entry is
/// evicted right away when the ranking score sits more than
/// `STD_DEV_THRESHOLD` deviations above the mean; otherwise the baseline
/// is frozen on the entry. Every call then compares the latest score
/// against the frozen baseline.
fn has_plan_performance_degraded(entry: &mut PlanCacheEntry, latest: &PlanFeedback) -> bool {
    if entry.average_score.is_none() {
        let n = entry.feedback.len() as f64;
        let mean = entry.feedback.iter().map(|f| f.score).sum::<f64>() / n;
        let sum_of_squares: f64 = entry
            .feedback
            .iter()
            .map(|f| (f.score - mean) * (f.score - mean))
            .sum();
        let stddev = (sum_of_squares / (n - 1.0)).sqrt();

        if entry.decision.score - mean > STD_DEV_THRESHOLD * stddev {
            return true;
        }

        entry.average_score = Some(mean);
        entry.stddev_score = Some(stddev);
    }

    match (entry.average_score, entry.stddev_score) {
        (Some(mean), Some(stddev)) => mean - latest.score > STD_DEV_THRESHOLD * stddev,
        _ => false,
    }
}
