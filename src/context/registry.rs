//! Registry of named context tables and their refresh schedules.

use super::filter::EntryFilter;
use super::loader::TableLoader;
use super::schema::TableSchema;
use super::table::{ContextTable, RefreshOutcome, TableInfo, TableSnapshot, TableSpec};
use crate::constants::DEFAULT_LOAD_TIMEOUT;
use crate::error::ServerError;
use crate::telemetry::{new_shared_metrics, SharedMetrics};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Registry shared between the tool adapter and the HTTP API.
pub type SharedRegistry = Arc<ContextRegistry>;

/// Holds the context tables and drives their periodic refreshes.
///
/// Reads (`get`, `scan`) never await and never wait for a load. Each
/// registered table gets its own refresh task on the current tokio runtime;
/// `shutdown` stops all of them.
pub struct ContextRegistry {
    tables: RwLock<HashMap<String, Arc<ContextTable>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
    load_timeout: Duration,
    metrics: SharedMetrics,
}

impl ContextRegistry {
    /// Create an empty registry with the default load timeout.
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            tables: RwLock::new(HashMap::new()),
            tasks: Mutex::new(Vec::new()),
            shutdown_tx,
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            metrics: new_shared_metrics(),
        }
    }

    /// Bound every load by `timeout`.
    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    /// Record into an existing metrics collector.
    pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Wrap in an `Arc` for sharing.
    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(self)
    }

    /// Metrics collector used by this registry.
    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    /// Timeout applied to each load.
    pub fn load_timeout(&self) -> Duration {
        self.load_timeout
    }

    /// Register a table, load it once, and schedule its periodic refresh.
    ///
    /// A failed initial load does not fail registration. The table stays
    /// empty until a scheduled refresh succeeds, and the failure is reported
    /// in the returned outcome.
    pub async fn register(
        &self,
        spec: TableSpec,
        loader: Arc<dyn TableLoader>,
    ) -> Result<RefreshOutcome, ServerError> {
        if self.is_shut_down() {
            return Err(ServerError::RegistryShutDown);
        }
        if spec.refresh_interval.is_zero() {
            return Err(ServerError::invalid_input(format!(
                "refresh interval for table {} must be greater than zero",
                spec.name
            )));
        }

        let table = {
            let mut tables = self.tables.write();
            if tables.contains_key(&spec.name) {
                return Err(ServerError::TableAlreadyRegistered(spec.name));
            }
            let table = Arc::new(ContextTable::new(spec, loader, self.metrics.clone()));
            tables.insert(table.name().to_string(), table.clone());
            table
        };

        let outcome = table.refresh(self.load_timeout).await;
        match &outcome {
            RefreshOutcome::Refreshed { entries, duration_ms } => info!(
                table = table.name(),
                entries,
                duration_ms,
                "Registered context table"
            ),
            RefreshOutcome::Failed { error, .. } => warn!(
                table = table.name(),
                "Registered context table without initial data: {}", error
            ),
            RefreshOutcome::Skipped => {}
        }

        let handle = tokio::spawn(run_schedule(
            table,
            self.load_timeout,
            self.shutdown_tx.subscribe(),
        ));
        self.tasks.lock().push(handle);

        Ok(outcome)
    }

    /// Point lookup. `Ok(None)` when the key is absent from the current snapshot.
    pub fn get(&self, table: &str, key: &str) -> Result<Option<Value>, ServerError> {
        let table = self.table(table)?;
        let snapshot = table.snapshot();
        self.check_staleness(&table, &snapshot);

        let entry = snapshot.get(key).cloned();
        self.metrics.record_lookup(entry.is_some());
        debug!(table = table.name(), key, hit = entry.is_some(), "Context lookup");
        Ok(entry)
    }

    /// All values of the current snapshot, in no particular order.
    pub fn scan(&self, table: &str) -> Result<Vec<Value>, ServerError> {
        self.scan_where(table, |_| true)
    }

    /// Values of the current snapshot accepted by `predicate`.
    pub fn scan_where<P>(&self, table: &str, predicate: P) -> Result<Vec<Value>, ServerError>
    where
        P: Fn(&Value) -> bool,
    {
        let table = self.table(table)?;
        let snapshot = table.snapshot();
        self.check_staleness(&table, &snapshot);
        self.metrics.record_scan();

        Ok(snapshot.values().filter(|v| predicate(v)).cloned().collect())
    }

    /// Values of the current snapshot matching a field-equality filter.
    pub fn scan_filtered(
        &self,
        table: &str,
        filter: &EntryFilter,
    ) -> Result<Vec<Value>, ServerError> {
        self.scan_where(table, |entry| filter.matches(entry))
    }

    /// Schema registered with the table, `Ok(None)` if it has none.
    pub fn describe_schema(&self, table: &str) -> Result<Option<TableSchema>, ServerError> {
        Ok(self.table(table)?.schema().cloned())
    }

    /// Metadata for every table, sorted by name.
    pub fn list_tables(&self) -> Vec<TableInfo> {
        let mut infos: Vec<TableInfo> = self.tables.read().values().map(|t| t.info()).collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Refresh one table now and report what happened.
    pub async fn refresh_once(&self, table: &str) -> Result<RefreshOutcome, ServerError> {
        let table = self.table(table)?;
        Ok(table.refresh(self.load_timeout).await)
    }

    /// Stop every scheduled refresh. Returns `false` if already shut down.
    ///
    /// A load already running completes and its result is applied.
    pub fn shutdown(&self) -> bool {
        let already = self.shutdown_tx.send_replace(true);
        if !already {
            info!(tables = self.len(), "Stopping context table refreshes");
        }
        !already
    }

    /// Whether `shutdown` has been called.
    pub fn is_shut_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Wait for every refresh task spawned so far to exit.
    pub async fn wait_stopped(&self) {
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Context refresh task ended abnormally: {}", e);
            }
        }
    }

    /// Whether a table with this name is registered.
    pub fn contains(&self, table: &str) -> bool {
        self.tables.read().contains_key(table)
    }

    /// Registered table names, sorted.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered tables.
    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    /// Whether no tables are registered.
    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }

    fn table(&self, name: &str) -> Result<Arc<ContextTable>, ServerError> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ServerError::table_not_found(name))
    }

    fn check_staleness(&self, table: &ContextTable, snapshot: &TableSnapshot) {
        if table.is_stale(snapshot) {
            self.metrics.record_stale_read();
            match snapshot.age() {
                Some(age) => warn!(
                    table = table.name(),
                    age_ms = age.as_millis() as u64,
                    ttl_ms = table.ttl().as_millis() as u64,
                    "Serving stale context data"
                ),
                None => warn!(table = table.name(), "Context table has not loaded yet"),
            }
        }
    }
}

impl Default for ContextRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ContextRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextRegistry")
            .field("tables", &self.table_names())
            .field("load_timeout", &self.load_timeout)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

/// Refresh loop for one table. The first tick fires one period after start.
async fn run_schedule(
    table: Arc<ContextTable>,
    load_timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let period = table.refresh_interval();
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        if *shutdown.borrow_and_update() {
            break;
        }
        tokio::select! {
            _ = ticker.tick() => {
                // Not raced against shutdown: an in-flight load always completes.
                table.refresh(load_timeout).await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    debug!(table = table.name(), "Context refresh task stopped");
}
