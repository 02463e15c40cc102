//! Error types for the feedback context server.
//!
//! Only `TableNotFound` and input validation errors are meant to reach
//! callers. Loader failures are absorbed by the refresh loop and surface
//! only through explicit refreshes, logs and metrics.

pub use mcpkit::McpError;
use serde_json::json;
use thiserror::Error;

/// Domain-specific errors for the feedback context server.
///
/// Named `ServerError` to avoid collision with `mcpkit::McpError`.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection error
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Authentication error
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Query execution error against the backing store
    #[error("Query execution error: {0}")]
    QueryExecution(String),

    /// Store rows could not be decoded into records
    #[error("Failed to decode {what}: {message}")]
    Decode { what: String, message: String },

    /// Operation timeout
    #[error("Timeout: operation exceeded {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// Requested context table was never registered
    #[error("Table {0} not found")]
    TableNotFound(String),

    /// A table with this name is already registered
    #[error("Table {0} is already registered")]
    TableAlreadyRegistered(String),

    /// The registry no longer accepts tables
    #[error("Context registry has been shut down")]
    RegistryShutDown,

    /// A table loader failed to produce a replacement snapshot
    #[error("Failed to load table {table}: {message}")]
    LoaderFailure { table: String, message: String },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a connection error with a source.
    pub fn connection_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an authentication error.
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a query execution error.
    pub fn query_error(msg: impl Into<String>) -> Self {
        Self::QueryExecution(msg.into())
    }

    /// Create a decode error.
    pub fn decode(what: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Decode {
            what: what.into(),
            message: msg.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(timeout: std::time::Duration) -> Self {
        Self::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// Create a table not found error.
    pub fn table_not_found(name: impl Into<String>) -> Self {
        Self::TableNotFound(name.into())
    }

    /// Create a loader failure for a table.
    pub fn loader(table: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::LoaderFailure {
            table: table.into(),
            message: msg.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this error is transient and may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Timeout { .. } | Self::LoaderFailure { .. }
        )
    }

    /// Stable machine-readable code for structured error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::Connection { .. } => "connection_error",
            Self::Authentication(_) => "authentication_failed",
            Self::QueryExecution(_) => "query_failed",
            Self::Decode { .. } => "decode_failed",
            Self::Timeout { .. } => "timeout",
            Self::TableNotFound(_) => "table_not_found",
            Self::TableAlreadyRegistered(_) => "table_already_registered",
            Self::RegistryShutDown => "registry_shut_down",
            Self::LoaderFailure { .. } => "loader_failure",
            Self::InvalidInput(_) => "invalid_input",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Get a user-friendly suggestion for how to fix this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Config(_) => Some("Check your environment variables and configuration"),
            Self::Connection { .. } => {
                Some("Check server hostname, port, and network connectivity")
            }
            Self::Authentication(_) => Some("Verify your username and password are correct"),
            Self::TableNotFound(_) => Some("Call get_tables_info to list the available tables"),
            Self::Timeout { .. } => Some("The backing store is slow; cached data is still served"),
            Self::LoaderFailure { .. } => {
                Some("The previous snapshot is kept and the next scheduled refresh retries")
            }
            _ => None,
        }
    }

    /// Render as the structured JSON error body returned by tools and HTTP.
    pub fn to_json(&self) -> serde_json::Value {
        let mut body = json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        if let Some(hint) = self.suggestion() {
            body["suggestion"] = json!(hint);
        }
        body
    }
}

/// Convert ServerError to mcpkit's McpError for protocol responses.
///
/// Note: Tool errors should generally return `ToolOutput::error()` with a message
/// instead of using this conversion. This is primarily for protocol-level errors.
impl From<ServerError> for McpError {
    fn from(e: ServerError) -> Self {
        match e {
            ServerError::Config(msg) => McpError::invalid_request(msg),
            ServerError::InvalidInput(msg) => McpError::invalid_params("input", msg),
            ServerError::TableNotFound(name) => {
                McpError::invalid_params("table", format!("Table {} not found", name))
            }
            other => McpError::internal(other.to_string()),
        }
    }
}

impl From<mssql_client::Error> for ServerError {
    fn from(e: mssql_client::Error) -> Self {
        ServerError::query_error(e.to_string())
    }
}

impl From<mssql_driver_pool::PoolError> for ServerError {
    fn from(e: mssql_driver_pool::PoolError) -> Self {
        ServerError::connection(format!("Pool error: {}", e))
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(e: serde_json::Error) -> Self {
        ServerError::decode("JSON", e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_table_not_found_message() {
        let err = ServerError::table_not_found("team_stats");
        assert_eq!(err.to_string(), "Table team_stats not found");
        assert_eq!(err.code(), "table_not_found");
    }

    #[test]
    fn test_transient_errors() {
        assert!(ServerError::timeout(Duration::from_secs(30)).is_transient());
        assert!(ServerError::connection("reset").is_transient());
        assert!(ServerError::loader("team_stats", "boom").is_transient());
        assert!(!ServerError::table_not_found("x").is_transient());
        assert!(!ServerError::auth("bad password").is_transient());
    }

    #[test]
    fn test_timeout_reports_millis() {
        let err = ServerError::timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "Timeout: operation exceeded 1500 ms");
    }

    #[test]
    fn test_error_json_body() {
        let body = ServerError::table_not_found("nope").to_json();
        assert_eq!(body["code"], "table_not_found");
        assert_eq!(body["error"], "Table nope not found");
        assert!(body["suggestion"].is_string());

        let body = ServerError::internal("x").to_json();
        assert!(body.get("suggestion").is_none());
    }

    #[test]
    fn test_error_suggestions() {
        assert!(ServerError::auth("Login failed").suggestion().is_some());
        assert!(ServerError::Internal("unknown".to_string())
            .suggestion()
            .is_none());
    }
}
