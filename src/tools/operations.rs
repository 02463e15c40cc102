//! Registry operations behind the MCP tools and the dashboard API.
//!
//! Each operation validates its arguments and returns the JSON document the
//! caller sends back, so both transports answer identically.

use crate::context::{ContextRegistry, EntryFilter};
use crate::error::ServerError;
use serde_json::{json, Value};
use tracing::debug;

/// Rejects blank values; anything else is returned as given.
fn required<'a>(name: &str, value: &'a str) -> Result<&'a str, ServerError> {
    if value.trim().is_empty() {
        return Err(ServerError::invalid_input(format!("{name} is required")));
    }
    Ok(value)
}

/// `query_context`: one entry, or `null` when the key is absent.
pub fn query_context(registry: &ContextRegistry, table: &str, key: &str) -> Result<Value, ServerError> {
    let table = required("table", table)?;
    let key = required("key", key)?;
    Ok(registry.get(table, key)?.unwrap_or(Value::Null))
}

/// `query_all_context`: every entry, optionally narrowed by a field filter.
pub fn query_all_context(
    registry: &ContextRegistry,
    table: &str,
    filter: Option<&Value>,
) -> Result<Value, ServerError> {
    let table = required("table", table)?;
    let entries = match filter {
        Some(filter) => registry.scan_filtered(table, &EntryFilter::from_json(filter)?)?,
        None => registry.scan(table)?,
    };
    debug!(table, count = entries.len(), "Scanned context table");
    Ok(Value::Array(entries))
}

/// `get_table_schema`: the schema, or `null` for tables without one.
pub fn get_table_schema(registry: &ContextRegistry, table: &str) -> Result<Value, ServerError> {
    let table = required("table", table)?;
    match registry.describe_schema(table)? {
        Some(schema) => Ok(serde_json::to_value(schema)?),
        None => Ok(Value::Null),
    }
}

/// `get_tables_info`: metadata for every registered table.
pub fn get_tables_info(registry: &ContextRegistry) -> Result<Value, ServerError> {
    Ok(serde_json::to_value(registry.list_tables())?)
}

/// `refresh_context_table`: reload one table now and report the outcome.
pub async fn refresh_context_table(
    registry: &ContextRegistry,
    table: &str,
) -> Result<Value, ServerError> {
    let table = required("table", table)?;
    let outcome = registry.refresh_once(table).await?;
    Ok(json!({ "table": table, "outcome": outcome }))
}

/// `get_context_metrics`: counters plus derived rates.
pub fn get_context_metrics(registry: &ContextRegistry) -> Result<Value, ServerError> {
    let snapshot = registry.metrics().snapshot();
    Ok(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "counters": snapshot,
        "hitRatePercent": snapshot.hit_rate(),
        "refreshSuccessRatePercent": snapshot.refresh_success_rate(),
        "avgLoadTimeMs": snapshot.avg_load_time_ms(),
        "tables": registry.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{loader_fn, FieldType, TableData, TableSchema, TableSpec};
    use std::time::Duration;

    async fn registry() -> ContextRegistry {
        let registry = ContextRegistry::new();
        let mut data = TableData::new();
        data.insert("a1".to_string(), json!({"id": "a1", "severity": "high"}));
        data.insert("a2".to_string(), json!({"id": "a2", "severity": "low"}));
        registry
            .register(
                TableSpec::new("anomaly_alerts", Duration::from_secs(120), Duration::from_secs(15))
                    .with_schema(TableSchema::new("id").field("id", FieldType::String)),
                loader_fn("alerts", move || {
                    let data = data.clone();
                    async move { Ok(data) }
                }),
            )
            .await
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_keys_are_matched_verbatim() {
        let registry = ContextRegistry::new();
        let mut data = TableData::new();
        data.insert(" padded ".to_string(), json!({"id": " padded "}));
        registry
            .register(
                TableSpec::new("feedback_context", Duration::from_secs(120), Duration::from_secs(30)),
                loader_fn("padded", move || {
                    let data = data.clone();
                    async move { Ok(data) }
                }),
            )
            .await
            .unwrap();

        assert_eq!(
            query_context(&registry, "feedback_context", " padded ").unwrap()["id"],
            json!(" padded ")
        );
        assert_eq!(
            query_context(&registry, "feedback_context", "padded").unwrap(),
            Value::Null
        );
        assert!(matches!(
            query_context(&registry, "feedback_context", "  \t"),
            Err(ServerError::InvalidInput(_))
        ));
        registry.shutdown();
    }

    #[tokio::test]
    async fn test_query_context() {
        let registry = registry().await;
        assert_eq!(
            query_context(&registry, "anomaly_alerts", "a1").unwrap()["severity"],
            json!("high")
        );
        assert_eq!(query_context(&registry, "anomaly_alerts", "zz").unwrap(), Value::Null);
        assert!(matches!(
            query_context(&registry, "", "a1"),
            Err(ServerError::InvalidInput(_))
        ));
        assert!(matches!(
            query_context(&registry, "missing", "a1"),
            Err(ServerError::TableNotFound(_))
        ));
        registry.shutdown();
    }

    #[tokio::test]
    async fn test_query_all_with_filter() {
        let registry = registry().await;
        let all = query_all_context(&registry, "anomaly_alerts", None).unwrap();
        assert_eq!(all.as_array().unwrap().len(), 2);

        let high = query_all_context(
            &registry,
            "anomaly_alerts",
            Some(&json!({"severity": "high"})),
        )
        .unwrap();
        assert_eq!(high, json!([{"id": "a1", "severity": "high"}]));

        let err = query_all_context(&registry, "anomaly_alerts", Some(&json!("high"))).unwrap_err();
        assert_eq!(err.code(), "invalid_input");
        registry.shutdown();
    }

    #[tokio::test]
    async fn test_schema_info_and_refresh() {
        let registry = registry().await;
        assert_eq!(
            get_table_schema(&registry, "anomaly_alerts").unwrap(),
            json!({"primaryKey": "id", "fields": {"id": "string"}})
        );

        let info = get_tables_info(&registry).unwrap();
        assert_eq!(info[0]["name"], json!("anomaly_alerts"));
        assert_eq!(info[0]["recordCount"], json!(2));
        assert_eq!(info[0]["ttl"], json!(120_000));

        let refreshed = refresh_context_table(&registry, "anomaly_alerts").await.unwrap();
        assert_eq!(refreshed["outcome"]["status"], json!("refreshed"));

        let metrics = get_context_metrics(&registry).unwrap();
        assert_eq!(metrics["counters"]["refreshes_succeeded"], json!(2));
        assert_eq!(metrics["tables"], json!(1));
        registry.shutdown();
    }
}
