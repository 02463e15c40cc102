//! MCP tools over the context registry.
//!
//! - `query_context`: Look up one entry by key
//! - `query_all_context`: List a table's entries, optionally filtered
//! - `get_table_schema`: Describe a table's fields
//! - `get_tables_info`: Entry counts, freshness and TTLs of all tables
//! - `refresh_context_table`: Reload one table immediately
//! - `get_context_metrics`: Cache and refresh counters
//!
//! Lookup failures come back as tool errors carrying a JSON body, never as
//! protocol errors.

pub mod operations;

use crate::error::ServerError;
use crate::server::FeedbackContextServer;
use mcpkit::prelude::*;
use serde_json::Value;
use tracing::debug;

/// Text of a tool response before it is wrapped for the protocol.
#[derive(Debug, Clone, PartialEq)]
enum ToolBody {
    /// Pretty-printed result value.
    Json(String),
    /// `{error, code, suggestion?}` document of a failed operation.
    Failure(String),
}

impl ToolBody {
    fn from_result(result: Result<Value, ServerError>) -> Result<Self, McpError> {
        match result {
            Ok(value) => serde_json::to_string_pretty(&value)
                .map(ToolBody::Json)
                .map_err(|e| McpError::internal(e.to_string())),
            Err(e) => {
                debug!("Tool call failed: {}", e);
                Ok(ToolBody::Failure(e.to_json().to_string()))
            }
        }
    }

    fn into_output(self) -> ToolOutput {
        match self {
            ToolBody::Json(text) => ToolOutput::text(text),
            ToolBody::Failure(text) => ToolOutput::error(text),
        }
    }
}

/// Render an operation result as tool output.
fn into_output(result: Result<Value, ServerError>) -> Result<ToolOutput, McpError> {
    ToolBody::from_result(result).map(ToolBody::into_output)
}

/// MCP server implementation containing the context tools.
///
/// The `#[mcp_server]` macro generates the MCP protocol infrastructure
/// for all `#[tool]` annotated methods.
#[mcp_server(
    name = "feedback-context-server",
    version = "0.1.0",
    instructions = "Real-time customer feedback context: recent feedback, cultural insights, team statistics and anomaly alerts, served from an in-memory cache refreshed from the feedback database"
)]
impl FeedbackContextServer {
    #[tool(description = "Get one entry from a context table by key. Returns null when the key is not present.")]
    pub async fn query_context(&self, table: String, key: String) -> Result<ToolOutput, McpError> {
        into_output(operations::query_context(&self.registry, &table, &key))
    }

    /// Filter fields are compared for equality with each entry's top-level fields.
    #[tool(description = "List all entries of a context table. Optional filter: JSON object of field values that must all match, e.g. {\"teamId\": \"team-1\"}.")]
    pub async fn query_all_context(
        &self,
        table: String,
        filter: Option<Value>,
    ) -> Result<ToolOutput, McpError> {
        into_output(operations::query_all_context(
            &self.registry,
            &table,
            filter.as_ref(),
        ))
    }

    #[tool(description = "Get the schema (primary key and field types) of a context table.")]
    pub async fn get_table_schema(&self, table: String) -> Result<ToolOutput, McpError> {
        into_output(operations::get_table_schema(&self.registry, &table))
    }

    #[tool(description = "List all context tables with record count, last update time and TTL.")]
    pub async fn get_tables_info(&self) -> Result<ToolOutput, McpError> {
        into_output(operations::get_tables_info(&self.registry))
    }

    /// Skipped when a refresh of the same table is already running.
    #[tool(description = "Reload a context table from the database now and report whether it succeeded.")]
    pub async fn refresh_context_table(&self, table: String) -> Result<ToolOutput, McpError> {
        into_output(operations::refresh_context_table(&self.registry, &table).await)
    }

    #[tool(description = "Get context cache metrics: lookups, hit rate, stale reads and refresh outcomes.")]
    pub async fn get_context_metrics(&self) -> Result<ToolOutput, McpError> {
        into_output(operations::get_context_metrics(&self.registry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn failure_json(result: Result<Value, ServerError>) -> Value {
        match ToolBody::from_result(result).unwrap() {
            ToolBody::Failure(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected a tool error, got {other:?}"),
        }
    }

    #[test]
    fn test_table_not_found_is_tool_error() {
        let body = failure_json(Err(ServerError::table_not_found("nope")));
        assert_eq!(body["code"], json!("table_not_found"));
        assert_eq!(body["error"], json!("Table nope not found"));
        assert!(body["suggestion"].is_string());
    }

    #[test]
    fn test_invalid_input_is_tool_error() {
        let body = failure_json(Err(ServerError::invalid_input("key is required")));
        assert_eq!(body["code"], json!("invalid_input"));
        assert!(body["error"].as_str().unwrap().contains("key is required"));
    }

    #[test]
    fn test_success_is_pretty_json() {
        let value = json!({"teamId": "team-1", "totalFeedback": 3});
        let body = ToolBody::from_result(Ok(value.clone())).unwrap();
        assert_eq!(
            body,
            ToolBody::Json(serde_json::to_string_pretty(&value).unwrap())
        );
        assert!(into_output(Ok(Value::Null)).is_ok());
    }
}
