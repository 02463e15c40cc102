//! Connection pool management for SQL Server.

use crate::config::DatabaseConfig;
use crate::error::ServerError;
use mssql_driver_pool::{Pool, PoolBuilder, PooledConnection};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Type alias for the connection pool.
pub type ConnectionPool = Pool;

/// Type alias for a pooled connection.
pub type PooledConn = PooledConnection;

/// Create a connection pool from configuration.
pub async fn create_pool(config: &DatabaseConfig) -> Result<ConnectionPool, ServerError> {
    info!(
        "Creating connection pool for {}:{}/{} (min: {}, max: {})",
        config.host,
        config.port,
        config.database,
        config.pool.min_connections,
        config.pool.max_connections
    );

    let client_config = mssql_client::Config::from_connection_string(&config.connection_string())
        .map_err(|e| ServerError::config(format!("Invalid connection settings: {}", e)))?;

    let pool = PoolBuilder::new()
        .client_config(client_config)
        .min_connections(config.pool.min_connections)
        .max_connections(config.pool.max_connections)
        .idle_timeout(config.pool.idle_timeout)
        .connection_timeout(config.pool.connection_timeout)
        .sp_reset_connection(true)
        .build()
        .await
        .map_err(|e| ServerError::connection_with_source("Failed to create connection pool", e))?;

    // An unreachable database is not fatal: tables stay empty and the
    // refresh schedules keep retrying.
    match pool.get().await {
        Ok(_conn) => debug!("Initial connection test successful"),
        Err(e) => warn!(
            "Initial connection to {}:{} failed, serving empty context until it recovers: {}",
            config.host, config.port, e
        ),
    }

    info!("Connection pool created");
    Ok(pool)
}

/// Get pool health status.
pub fn pool_status(pool: &ConnectionPool) -> PoolStatus {
    let status = pool.status();
    PoolStatus {
        total_connections: status.total as usize,
        available_connections: status.available as usize,
        in_use_connections: status.in_use as usize,
        max_connections: status.max as usize,
    }
}

/// Pool status information.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    /// Total number of connections in the pool.
    pub total_connections: usize,
    /// Number of connections available for checkout.
    pub available_connections: usize,
    /// Number of connections currently in use.
    pub in_use_connections: usize,
    /// Maximum allowed connections.
    pub max_connections: usize,
}
