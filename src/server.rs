//! MCP server struct definition and initialization.

use crate::config::Config;
use crate::context::{ContextRegistry, SharedRegistry};
use crate::database::{create_pool, MssqlFeedbackStore, PoolStatus};
use crate::error::ServerError;
use crate::feedback::register_standard_tables;
use crate::telemetry::SharedMetrics;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// The feedback context MCP server instance.
///
/// This struct is cloned for each request, but the inner state is shared
/// via Arc. The server owns the context registry; transports and tools only
/// read from it.
#[derive(Clone)]
pub struct FeedbackContextServer {
    /// Context tables served to agents.
    pub(crate) registry: SharedRegistry,

    /// Store behind the standard tables, absent for custom registries.
    pub(crate) store: Option<Arc<MssqlFeedbackStore>>,

    /// Process start, for uptime reporting.
    pub(crate) started_at: Instant,
}

impl FeedbackContextServer {
    /// Create a new server instance with the given configuration.
    ///
    /// This performs async initialization including:
    /// - Creating the connection pool
    /// - Registering the standard context tables and loading them once
    /// - Starting their refresh schedules
    pub async fn new(config: Config) -> Result<Self, ServerError> {
        let pool = create_pool(&config.database).await?;
        let store = Arc::new(MssqlFeedbackStore::new(pool));

        let registry = ContextRegistry::new()
            .with_load_timeout(config.context.load_timeout)
            .into_shared();

        let outcomes = register_standard_tables(&registry, store.clone(), &config.context).await?;
        let failed = outcomes.iter().filter(|(_, o)| o.is_failed()).count();
        if failed > 0 {
            warn!(
                failed,
                "Some context tables failed their initial load and will retry on schedule"
            );
        }
        info!(tables = registry.len(), "Context registry ready");

        Ok(Self {
            registry,
            store: Some(store),
            started_at: Instant::now(),
        })
    }

    /// Create a server from environment variables.
    ///
    /// This is the standard way to create a server for production use.
    pub async fn from_env() -> Result<Self, ServerError> {
        let config = Config::from_env()?;
        Self::new(config).await
    }

    /// Serve an already populated registry without a database.
    pub fn with_registry(registry: SharedRegistry) -> Self {
        Self {
            registry,
            store: None,
            started_at: Instant::now(),
        }
    }

    /// Get a reference to the context registry.
    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Get a reference to the metrics collector.
    pub fn metrics(&self) -> &SharedMetrics {
        self.registry.metrics()
    }

    /// Connection pool status, if the server owns a database store.
    pub fn pool_status(&self) -> Option<PoolStatus> {
        self.store.as_ref().map(|s| s.pool_status())
    }

    /// Seconds since the server was created.
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
