//! Context engine metrics.
//!
//! Lock-free counters for reads, staleness and refresh outcomes. A
//! serializable snapshot is exposed through the `get_context_metrics` tool
//! and the HTTP health endpoint.

use crate::constants::PERCENTAGE_MULTIPLIER;
use crate::context::RefreshOutcome;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Context engine metrics collection.
#[derive(Debug, Default)]
pub struct ContextMetrics {
    /// Point lookups served.
    pub lookups: AtomicU64,

    /// Point lookups that found an entry.
    pub hits: AtomicU64,

    /// Point lookups for absent keys.
    pub misses: AtomicU64,

    /// Table scans served.
    pub scans: AtomicU64,

    /// Reads served from a table older than its TTL.
    pub stale_reads: AtomicU64,

    /// Loads that replaced a snapshot.
    pub refreshes_succeeded: AtomicU64,

    /// Loads that failed or timed out.
    pub refreshes_failed: AtomicU64,

    /// Refreshes skipped because one was already running.
    pub refreshes_skipped: AtomicU64,

    /// Total time spent in loads, in milliseconds.
    pub load_time_ms_total: AtomicU64,
}

impl ContextMetrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a point lookup.
    pub fn record_lookup(&self, hit: bool) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a table scan.
    pub fn record_scan(&self) {
        self.scans.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a read against stale data.
    pub fn record_stale_read(&self) {
        self.stale_reads.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of a refresh attempt.
    pub fn record_refresh(&self, outcome: &RefreshOutcome) {
        match outcome {
            RefreshOutcome::Refreshed { duration_ms, .. } => {
                self.refreshes_succeeded.fetch_add(1, Ordering::Relaxed);
                self.load_time_ms_total
                    .fetch_add(*duration_ms, Ordering::Relaxed);
            }
            RefreshOutcome::Failed { duration_ms, .. } => {
                self.refreshes_failed.fetch_add(1, Ordering::Relaxed);
                self.load_time_ms_total
                    .fetch_add(*duration_ms, Ordering::Relaxed);
            }
            RefreshOutcome::Skipped => {
                self.refreshes_skipped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            lookups: self.lookups.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            scans: self.scans.load(Ordering::Relaxed),
            stale_reads: self.stale_reads.load(Ordering::Relaxed),
            refreshes_succeeded: self.refreshes_succeeded.load(Ordering::Relaxed),
            refreshes_failed: self.refreshes_failed.load(Ordering::Relaxed),
            refreshes_skipped: self.refreshes_skipped.load(Ordering::Relaxed),
            load_time_ms_total: self.load_time_ms_total.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub lookups: u64,
    pub hits: u64,
    pub misses: u64,
    pub scans: u64,
    pub stale_reads: u64,
    pub refreshes_succeeded: u64,
    pub refreshes_failed: u64,
    pub refreshes_skipped: u64,
    pub load_time_ms_total: u64,
}

impl MetricsSnapshot {
    /// Lookup hit rate as a percentage.
    pub fn hit_rate(&self) -> f64 {
        if self.lookups == 0 {
            return 0.0;
        }
        (self.hits as f64 / self.lookups as f64) * PERCENTAGE_MULTIPLIER
    }

    /// Share of attempted loads that succeeded, as a percentage.
    pub fn refresh_success_rate(&self) -> f64 {
        let attempted = self.refreshes_succeeded + self.refreshes_failed;
        if attempted == 0 {
            return 100.0;
        }
        (self.refreshes_succeeded as f64 / attempted as f64) * PERCENTAGE_MULTIPLIER
    }

    /// Average load duration in milliseconds.
    pub fn avg_load_time_ms(&self) -> f64 {
        let attempted = self.refreshes_succeeded + self.refreshes_failed;
        if attempted == 0 {
            return 0.0;
        }
        self.load_time_ms_total as f64 / attempted as f64
    }
}

/// Shared metrics type.
pub type SharedMetrics = Arc<ContextMetrics>;

/// Create a new shared metrics collector.
pub fn new_shared_metrics() -> SharedMetrics {
    Arc::new(ContextMetrics::new())
}
