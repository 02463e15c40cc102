//! A single named context table and its snapshot.
//!
//! The table holds an `Arc` to an immutable [`TableSnapshot`]. Refreshing
//! builds a whole new snapshot outside any lock and swaps the pointer, so
//! readers always observe one complete load.

use super::loader::{TableData, TableLoader};
use super::schema::TableSchema;
use crate::error::ServerError;
use crate::telemetry::SharedMetrics;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Static definition of a context table.
#[derive(Debug, Clone)]
pub struct TableSpec {
    /// Unique table name.
    pub name: String,

    /// Age after which reads log a staleness warning.
    pub ttl: Duration,

    /// Period between scheduled refreshes.
    pub refresh_interval: Duration,

    /// Optional introspection schema.
    pub schema: Option<TableSchema>,
}

impl TableSpec {
    /// Create a table definition without a schema.
    pub fn new(name: impl Into<String>, ttl: Duration, refresh_interval: Duration) -> Self {
        Self {
            name: name.into(),
            ttl,
            refresh_interval,
            schema: None,
        }
    }

    /// Attach a schema description.
    pub fn with_schema(mut self, schema: TableSchema) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// Immutable contents of a table as of one successful load.
#[derive(Debug, Default)]
pub struct TableSnapshot {
    entries: TableData,
    refreshed_at: Option<DateTime<Utc>>,
    loaded_at: Option<Instant>,
}

impl TableSnapshot {
    fn loaded(entries: TableData) -> Self {
        Self {
            entries,
            refreshed_at: Some(Utc::now()),
            loaded_at: Some(Instant::now()),
        }
    }

    /// Look up an entry by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Iterate over all keys.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Iterate over all entries.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.values()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Wall-clock time of the load, `None` if the table never loaded.
    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    /// Time since the load, `None` if the table never loaded.
    pub fn age(&self) -> Option<Duration> {
        self.loaded_at.map(|at| at.elapsed())
    }
}

/// Result of one refresh attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// The snapshot was replaced.
    Refreshed { entries: usize, duration_ms: u64 },

    /// Another refresh of the same table was already running.
    Skipped,

    /// The load failed; the previous snapshot is still served.
    Failed { error: String, duration_ms: u64 },
}

impl RefreshOutcome {
    /// Whether the snapshot was replaced.
    pub fn is_refreshed(&self) -> bool {
        matches!(self, RefreshOutcome::Refreshed { .. })
    }

    /// Whether the load failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, RefreshOutcome::Failed { .. })
    }
}

/// Table metadata reported by `list_tables`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    pub name: String,
    pub record_count: usize,
    pub last_updated: Option<DateTime<Utc>>,
    /// TTL in milliseconds.
    pub ttl: u64,
    /// Refresh interval in milliseconds.
    pub refresh_interval: u64,
    pub stale: bool,
    pub refreshing: bool,
    pub refresh_count: u64,
    pub failed_refreshes: u64,
}

/// Clears the in-progress flag when a refresh ends, including on cancellation.
struct RefreshGuard<'a>(&'a AtomicBool);

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A registered context table.
pub struct ContextTable {
    spec: TableSpec,
    loader: Arc<dyn TableLoader>,
    snapshot: RwLock<Arc<TableSnapshot>>,
    refreshing: AtomicBool,
    refresh_count: AtomicU64,
    failed_refreshes: AtomicU64,
    metrics: SharedMetrics,
}

impl ContextTable {
    pub(crate) fn new(spec: TableSpec, loader: Arc<dyn TableLoader>, metrics: SharedMetrics) -> Self {
        Self {
            spec,
            loader,
            snapshot: RwLock::new(Arc::new(TableSnapshot::default())),
            refreshing: AtomicBool::new(false),
            refresh_count: AtomicU64::new(0),
            failed_refreshes: AtomicU64::new(0),
            metrics,
        }
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Staleness threshold.
    pub fn ttl(&self) -> Duration {
        self.spec.ttl
    }

    /// Scheduled refresh period.
    pub fn refresh_interval(&self) -> Duration {
        self.spec.refresh_interval
    }

    /// Introspection schema, if one was registered.
    pub fn schema(&self) -> Option<&TableSchema> {
        self.spec.schema.as_ref()
    }

    /// Current snapshot. Never blocks on a running refresh.
    pub fn snapshot(&self) -> Arc<TableSnapshot> {
        self.snapshot.read().clone()
    }

    /// Whether `snapshot` is older than the TTL. Never-loaded tables are stale.
    pub fn is_stale(&self, snapshot: &TableSnapshot) -> bool {
        snapshot.age().map_or(true, |age| age > self.spec.ttl)
    }

    /// Whether a refresh is running right now.
    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    /// Reload the table once, bounded by `timeout`.
    ///
    /// Returns `Skipped` without calling the loader when another refresh of
    /// this table is in progress. On failure the previous snapshot stays.
    pub async fn refresh(&self, timeout: Duration) -> RefreshOutcome {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(table = self.name(), "Refresh already in progress, skipping");
            let outcome = RefreshOutcome::Skipped;
            self.metrics.record_refresh(&outcome);
            return outcome;
        }
        let _guard = RefreshGuard(&self.refreshing);

        let started = Instant::now();
        let result = match tokio::time::timeout(timeout, self.loader.load()).await {
            Ok(result) => result,
            Err(_) => Err(ServerError::timeout(timeout)),
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        let outcome = match result {
            Ok(entries) => {
                let count = entries.len();
                *self.snapshot.write() = Arc::new(TableSnapshot::loaded(entries));
                self.refresh_count.fetch_add(1, Ordering::Relaxed);
                debug!(
                    table = self.name(),
                    loader = self.loader.describe(),
                    entries = count,
                    duration_ms,
                    "Refreshed context table"
                );
                RefreshOutcome::Refreshed {
                    entries: count,
                    duration_ms,
                }
            }
            Err(e) => {
                self.failed_refreshes.fetch_add(1, Ordering::Relaxed);
                let error = ServerError::loader(self.name(), e.to_string());
                warn!(
                    table = self.name(),
                    loader = self.loader.describe(),
                    duration_ms,
                    "{}",
                    error
                );
                RefreshOutcome::Failed {
                    error: error.to_string(),
                    duration_ms,
                }
            }
        };

        self.metrics.record_refresh(&outcome);
        outcome
    }

    /// Metadata for `list_tables`.
    pub fn info(&self) -> TableInfo {
        let snapshot = self.snapshot();
        TableInfo {
            name: self.spec.name.clone(),
            record_count: snapshot.len(),
            last_updated: snapshot.refreshed_at(),
            ttl: self.spec.ttl.as_millis() as u64,
            refresh_interval: self.spec.refresh_interval.as_millis() as u64,
            stale: self.is_stale(&snapshot),
            refreshing: self.is_refreshing(),
            refresh_count: self.refresh_count.load(Ordering::Relaxed),
            failed_refreshes: self.failed_refreshes.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for ContextTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextTable")
            .field("name", &self.spec.name)
            .field("loader", &self.loader.describe())
            .field("entries", &self.snapshot().len())
            .finish()
    }
}
