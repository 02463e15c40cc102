//! Configuration management for the feedback context server.
//!
//! Configuration is loaded from environment variables following the 12-factor app pattern.

use crate::constants::{
    ANOMALY_ALERTS_REFRESH, ANOMALY_ALERTS_TTL, CULTURAL_INSIGHTS_REFRESH, CULTURAL_INSIGHTS_TTL,
    DEFAULT_ALERT_LIMIT, DEFAULT_ALERT_WINDOW_MINUTES, DEFAULT_CONNECTION_TIMEOUT,
    DEFAULT_CONNECTION_TIMEOUT_SECS, DEFAULT_DATABASE, DEFAULT_FEEDBACK_LIMIT,
    DEFAULT_FEEDBACK_WINDOW_HOURS, DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_INSIGHT_WINDOW_DAYS,
    DEFAULT_LOAD_TIMEOUT, DEFAULT_LOAD_TIMEOUT_SECS, DEFAULT_MAX_CONNECTIONS,
    DEFAULT_MIN_CONNECTIONS, DEFAULT_MSSQL_PORT, DEFAULT_STATS_WINDOW_HOURS,
    FEEDBACK_CONTEXT_REFRESH, FEEDBACK_CONTEXT_TTL, TEAM_STATS_REFRESH, TEAM_STATS_TTL,
};
use crate::error::ServerError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database connection configuration
    pub database: DatabaseConfig,

    /// Context table schedules and loader windows
    pub context: ContextConfig,
}

/// Database connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQL Server hostname or IP address
    pub host: String,

    /// SQL Server port (default: 1433)
    pub port: u16,

    /// Feedback database name
    pub database: String,

    /// SQL Server login
    pub username: String,

    /// SQL Server password
    #[serde(skip_serializing)]
    pub password: String,

    /// Connection pool configuration
    pub pool: PoolConfig,

    /// Enable TLS encryption
    pub encrypt: bool,

    /// Trust server certificate (for self-signed certs)
    pub trust_server_certificate: bool,

    /// Application name sent to SQL Server
    pub application_name: String,
}

/// Connection pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Connection timeout
    pub connection_timeout: Duration,

    /// Idle connection timeout
    pub idle_timeout: Duration,
}

/// TTL and refresh period of one context table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchedule {
    /// Age after which reads log a staleness warning
    pub ttl: Duration,

    /// Period between refreshes
    pub refresh_interval: Duration,
}

impl TableSchedule {
    /// Create a schedule.
    pub const fn new(ttl: Duration, refresh_interval: Duration) -> Self {
        Self {
            ttl,
            refresh_interval,
        }
    }

    /// Read `CONTEXT_<PREFIX>_TTL` and `CONTEXT_<PREFIX>_REFRESH` (seconds), falling back to `self`.
    fn overridden_from_env(self, prefix: &str) -> Self {
        Self {
            ttl: env_secs(&format!("CONTEXT_{prefix}_TTL")).unwrap_or(self.ttl),
            refresh_interval: env_secs(&format!("CONTEXT_{prefix}_REFRESH"))
                .unwrap_or(self.refresh_interval),
        }
    }
}

/// Context engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Upper bound on a single table load
    pub load_timeout: Duration,

    /// `feedback_context` schedule
    pub feedback: TableSchedule,

    /// `cultural_insights` schedule
    pub insights: TableSchedule,

    /// `team_stats` schedule
    pub team_stats: TableSchedule,

    /// `anomaly_alerts` schedule
    pub alerts: TableSchedule,

    /// Look-back window of the feedback context
    pub feedback_window: Duration,

    /// Maximum feedback rows per load
    pub feedback_limit: usize,

    /// Look-back window of cultural insights
    pub insight_window: Duration,

    /// Window aggregated into team statistics
    pub stats_window: Duration,

    /// Look-back window of anomaly alerts
    pub alert_window: Duration,

    /// Maximum anomaly alerts per load
    pub alert_limit: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// ## Required
    /// - `MSSQL_HOST`: SQL Server hostname
    /// - `MSSQL_USER`: SQL Server username
    /// - `MSSQL_PASSWORD`: SQL Server password
    ///
    /// ## Optional
    /// - `MSSQL_PORT`: Port number (default: 1433)
    /// - `MSSQL_DATABASE`: Database name (default: feedback)
    /// - `MSSQL_ENCRYPT`: Enable TLS (default: true)
    /// - `MSSQL_TRUST_CERT`: Trust server certificate (default: false)
    /// - `MSSQL_POOL_MIN`: Minimum pool connections (default: 1)
    /// - `MSSQL_POOL_MAX`: Maximum pool connections (default: 5)
    /// - `MSSQL_CONNECT_TIMEOUT`: Connection timeout in seconds (default: 30)
    /// - `MSSQL_IDLE_TIMEOUT`: Idle connection timeout in seconds (default: 300)
    /// - `CONTEXT_*`: see [`ContextConfig::from_env`]
    pub fn from_env() -> Result<Self, ServerError> {
        Ok(Config {
            database: DatabaseConfig::from_env()?,
            context: ContextConfig::from_env()?,
        })
    }
}

impl DatabaseConfig {
    /// Load database settings from `MSSQL_*` variables.
    pub fn from_env() -> Result<Self, ServerError> {
        // Required: Host
        let host = std::env::var("MSSQL_HOST")
            .map_err(|_| ServerError::config("MSSQL_HOST environment variable is required"))?;

        let (username, password) = match (
            std::env::var("MSSQL_USER").ok(),
            std::env::var("MSSQL_PASSWORD").ok(),
        ) {
            (Some(u), Some(p)) => (u, p),
            (Some(_), None) => {
                return Err(ServerError::config(
                    "MSSQL_PASSWORD is required when MSSQL_USER is set",
                ))
            }
            (None, Some(_)) => {
                return Err(ServerError::config(
                    "MSSQL_USER is required when MSSQL_PASSWORD is set",
                ))
            }
            (None, None) => {
                return Err(ServerError::config(
                    "Authentication required: set MSSQL_USER and MSSQL_PASSWORD",
                ))
            }
        };

        let port = env_parse("MSSQL_PORT").unwrap_or(DEFAULT_MSSQL_PORT);

        let database =
            std::env::var("MSSQL_DATABASE").unwrap_or_else(|_| DEFAULT_DATABASE.to_string());

        let encrypt = env_flag("MSSQL_ENCRYPT").unwrap_or(true);
        let trust_server_certificate = env_flag("MSSQL_TRUST_CERT").unwrap_or(false);

        let min_connections = env_parse("MSSQL_POOL_MIN").unwrap_or(DEFAULT_MIN_CONNECTIONS);
        let max_connections = env_parse("MSSQL_POOL_MAX").unwrap_or(DEFAULT_MAX_CONNECTIONS);
        if min_connections > max_connections {
            return Err(ServerError::config(format!(
                "MSSQL_POOL_MIN ({min_connections}) exceeds MSSQL_POOL_MAX ({max_connections})"
            )));
        }

        let connection_timeout_secs =
            env_parse("MSSQL_CONNECT_TIMEOUT").unwrap_or(DEFAULT_CONNECTION_TIMEOUT_SECS);
        let idle_timeout_secs = env_parse("MSSQL_IDLE_TIMEOUT").unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS);

        Ok(Self {
            host,
            port,
            database,
            username,
            password,
            pool: PoolConfig {
                min_connections,
                max_connections,
                connection_timeout: Duration::from_secs(connection_timeout_secs),
                idle_timeout: Duration::from_secs(idle_timeout_secs),
            },
            encrypt,
            trust_server_certificate,
            application_name: "feedback-context-server".to_string(),
        })
    }

    /// ADO.NET style connection string for the driver.
    pub fn connection_string(&self) -> String {
        format!(
            "Server={},{};Database={};User Id={};Password={};Encrypt={};TrustServerCertificate={};Connect Timeout={};Application Name={}",
            self.host,
            self.port,
            self.database,
            self.username,
            self.password,
            self.encrypt,
            self.trust_server_certificate,
            self.pool.connection_timeout.as_secs(),
            self.application_name,
        )
    }
}

impl ContextConfig {
    /// Load context engine settings from `CONTEXT_*` variables.
    ///
    /// # Environment Variables
    ///
    /// - `CONTEXT_LOAD_TIMEOUT`: Per-load timeout in seconds (default: 30)
    /// - `CONTEXT_{FEEDBACK,INSIGHTS,TEAM_STATS,ALERTS}_TTL`: TTL in seconds
    /// - `CONTEXT_{FEEDBACK,INSIGHTS,TEAM_STATS,ALERTS}_REFRESH`: Refresh period in seconds
    /// - `CONTEXT_FEEDBACK_WINDOW_HOURS` (default: 24), `CONTEXT_FEEDBACK_LIMIT` (default: 1000)
    /// - `CONTEXT_INSIGHT_WINDOW_DAYS` (default: 7)
    /// - `CONTEXT_STATS_WINDOW_HOURS` (default: 24)
    /// - `CONTEXT_ALERT_WINDOW_MINUTES` (default: 60), `CONTEXT_ALERT_LIMIT` (default: 100)
    pub fn from_env() -> Result<Self, ServerError> {
        let defaults = Self::default();

        let load_timeout_secs = env_parse("CONTEXT_LOAD_TIMEOUT").unwrap_or(DEFAULT_LOAD_TIMEOUT_SECS);

        let config = Self {
            load_timeout: Duration::from_secs(load_timeout_secs),
            feedback: defaults.feedback.overridden_from_env("FEEDBACK"),
            insights: defaults.insights.overridden_from_env("INSIGHTS"),
            team_stats: defaults.team_stats.overridden_from_env("TEAM_STATS"),
            alerts: defaults.alerts.overridden_from_env("ALERTS"),
            feedback_window: hours(
                env_parse("CONTEXT_FEEDBACK_WINDOW_HOURS").unwrap_or(DEFAULT_FEEDBACK_WINDOW_HOURS),
            ),
            feedback_limit: env_parse("CONTEXT_FEEDBACK_LIMIT").unwrap_or(DEFAULT_FEEDBACK_LIMIT),
            insight_window: hours(
                24 * env_parse("CONTEXT_INSIGHT_WINDOW_DAYS").unwrap_or(DEFAULT_INSIGHT_WINDOW_DAYS),
            ),
            stats_window: hours(
                env_parse("CONTEXT_STATS_WINDOW_HOURS").unwrap_or(DEFAULT_STATS_WINDOW_HOURS),
            ),
            alert_window: Duration::from_secs(
                60 * env_parse("CONTEXT_ALERT_WINDOW_MINUTES").unwrap_or(DEFAULT_ALERT_WINDOW_MINUTES)
                    as u64,
            ),
            alert_limit: env_parse("CONTEXT_ALERT_LIMIT").unwrap_or(DEFAULT_ALERT_LIMIT),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the registry cannot run with.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.load_timeout.is_zero() {
            return Err(ServerError::config("CONTEXT_LOAD_TIMEOUT must be greater than zero"));
        }
        for (name, schedule) in [
            ("FEEDBACK", &self.feedback),
            ("INSIGHTS", &self.insights),
            ("TEAM_STATS", &self.team_stats),
            ("ALERTS", &self.alerts),
        ] {
            if schedule.refresh_interval.is_zero() {
                return Err(ServerError::config(format!(
                    "CONTEXT_{name}_REFRESH must be greater than zero"
                )));
            }
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: DEFAULT_MIN_CONNECTIONS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            feedback: TableSchedule::new(FEEDBACK_CONTEXT_TTL, FEEDBACK_CONTEXT_REFRESH),
            insights: TableSchedule::new(CULTURAL_INSIGHTS_TTL, CULTURAL_INSIGHTS_REFRESH),
            team_stats: TableSchedule::new(TEAM_STATS_TTL, TEAM_STATS_REFRESH),
            alerts: TableSchedule::new(ANOMALY_ALERTS_TTL, ANOMALY_ALERTS_REFRESH),
            feedback_window: hours(DEFAULT_FEEDBACK_WINDOW_HOURS),
            feedback_limit: DEFAULT_FEEDBACK_LIMIT,
            insight_window: hours(24 * DEFAULT_INSIGHT_WINDOW_DAYS),
            stats_window: hours(DEFAULT_STATS_WINDOW_HOURS),
            alert_window: Duration::from_secs(60 * DEFAULT_ALERT_WINDOW_MINUTES as u64),
            alert_limit: DEFAULT_ALERT_LIMIT,
        }
    }
}

fn hours(n: i64) -> Duration {
    Duration::from_secs(n.max(0) as u64 * 3600)
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_secs(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_secs)
}

fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const CONTEXT_VARS: &[&str] = &[
        "CONTEXT_LOAD_TIMEOUT",
        "CONTEXT_FEEDBACK_TTL",
        "CONTEXT_FEEDBACK_REFRESH",
        "CONTEXT_ALERTS_REFRESH",
        "CONTEXT_FEEDBACK_LIMIT",
        "CONTEXT_INSIGHT_WINDOW_DAYS",
    ];

    fn clear(vars: &[&str]) {
        for var in vars {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_pool_config_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.max_connections, 5);
    }

    #[test]
    fn test_context_defaults_match_engine_schedules() {
        let config = ContextConfig::default();
        assert_eq!(config.feedback.refresh_interval, Duration::from_secs(30));
        assert_eq!(config.insights.ttl, Duration::from_secs(900));
        assert_eq!(config.team_stats.refresh_interval, Duration::from_secs(60));
        assert_eq!(config.alerts.refresh_interval, Duration::from_secs(15));
        assert_eq!(config.insight_window, Duration::from_secs(7 * 24 * 3600));
        assert_eq!(config.alert_window, Duration::from_secs(3600));
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_context_env_overrides() {
        clear(CONTEXT_VARS);
        std::env::set_var("CONTEXT_FEEDBACK_TTL", "120");
        std::env::set_var("CONTEXT_FEEDBACK_REFRESH", "5");
        std::env::set_var("CONTEXT_FEEDBACK_LIMIT", "50");
        std::env::set_var("CONTEXT_INSIGHT_WINDOW_DAYS", "2");

        let config = ContextConfig::from_env().unwrap();
        assert_eq!(config.feedback, TableSchedule::new(Duration::from_secs(120), Duration::from_secs(5)));
        assert_eq!(config.feedback_limit, 50);
        assert_eq!(config.insight_window, Duration::from_secs(2 * 24 * 3600));
        assert_eq!(config.alerts.refresh_interval, ANOMALY_ALERTS_REFRESH);

        clear(CONTEXT_VARS);
    }

    #[test]
    #[serial]
    fn test_zero_refresh_rejected() {
        clear(CONTEXT_VARS);
        std::env::set_var("CONTEXT_ALERTS_REFRESH", "0");

        let err = ContextConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("CONTEXT_ALERTS_REFRESH"));

        clear(CONTEXT_VARS);
    }

    #[test]
    #[serial]
    fn test_database_requires_credentials() {
        std::env::set_var("MSSQL_HOST", "localhost");
        std::env::remove_var("MSSQL_USER");
        std::env::set_var("MSSQL_PASSWORD", "secret");

        let err = DatabaseConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("MSSQL_USER"));

        std::env::set_var("MSSQL_USER", "sa");
        let config = DatabaseConfig::from_env().unwrap();
        assert_eq!(config.port, 1433);
        assert_eq!(config.database, "feedback");
        assert!(config.connection_string().contains("Server=localhost,1433"));

        clear(&["MSSQL_HOST", "MSSQL_USER", "MSSQL_PASSWORD"]);
    }
}
