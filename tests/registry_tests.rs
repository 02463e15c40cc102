//! Black-box tests of the context registry through the public API.
//!
//! Loaders here are in-memory closures; no database is involved.

use feedback_context_server::context::{
    loader_fn, ContextRegistry, EntryFilter, FieldType, RefreshOutcome, TableData, TableLoader,
    TableSchema, TableSpec,
};
use feedback_context_server::ServerError;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn spec(name: &str) -> TableSpec {
    TableSpec::new(name, Duration::from_secs(600), Duration::from_secs(120))
}

fn data(entries: &[(&str, Value)]) -> TableData {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn fixed(entries: TableData) -> Arc<dyn TableLoader> {
    loader_fn("fixed", move || {
        let entries = entries.clone();
        async move { Ok(entries) }
    })
}

#[tokio::test]
async fn team_stats_lookup_scenario() {
    let registry = ContextRegistry::new();
    let team_1 = json!({"totalFeedback": 10, "averageRating": 4.2});
    registry
        .register(spec("team_stats"), fixed(data(&[("team-1", team_1.clone())])))
        .await
        .unwrap();

    assert_eq!(registry.get("team_stats", "team-1").unwrap(), Some(team_1));
    assert_eq!(registry.get("team_stats", "team-2").unwrap(), None);

    let info = registry.list_tables();
    assert_eq!(info.len(), 1);
    assert_eq!(info[0].name, "team_stats");
    assert_eq!(info[0].record_count, 1);
    assert!(!info[0].stale);
    registry.shutdown();
}

#[tokio::test]
async fn empty_table_scans_to_empty() {
    let registry = ContextRegistry::new();
    let outcome = registry
        .register(spec("anomaly_alerts"), fixed(TableData::new()))
        .await
        .unwrap();

    assert!(matches!(outcome, RefreshOutcome::Refreshed { entries: 0, .. }));
    assert!(registry.scan("anomaly_alerts").unwrap().is_empty());
    registry.shutdown();
}

#[tokio::test]
async fn unknown_tables_are_not_found() {
    let registry = ContextRegistry::new();

    assert!(matches!(
        registry.get("missing", "k"),
        Err(ServerError::TableNotFound(name)) if name == "missing"
    ));
    assert!(matches!(
        registry.scan("missing"),
        Err(ServerError::TableNotFound(_))
    ));
    assert!(matches!(
        registry.describe_schema("missing"),
        Err(ServerError::TableNotFound(_))
    ));
    assert!(matches!(
        registry.refresh_once("missing").await,
        Err(ServerError::TableNotFound(_))
    ));
}

#[tokio::test]
async fn record_count_matches_first_load() {
    let registry = ContextRegistry::new();
    let entries = data(&[
        ("a", json!({"n": 1})),
        ("b", json!({"n": 2})),
        ("c", json!({"n": 3})),
    ]);
    registry.register(spec("t"), fixed(entries)).await.unwrap();

    assert_eq!(registry.list_tables()[0].record_count, 3);
    registry.shutdown();
}

#[tokio::test]
async fn scan_equals_all_lookups() {
    let registry = ContextRegistry::new();
    let entries = data(&[
        ("f1", json!({"id": "f1", "teamId": "team-1"})),
        ("f2", json!({"id": "f2", "teamId": "team-2"})),
        ("f3", json!({"id": "f3", "teamId": "team-1"})),
    ]);
    let keys: Vec<String> = entries.keys().cloned().collect();
    registry.register(spec("feedback_context"), fixed(entries)).await.unwrap();

    let scanned: HashSet<String> = registry
        .scan("feedback_context")
        .unwrap()
        .iter()
        .map(Value::to_string)
        .collect();
    let looked_up: HashSet<String> = keys
        .iter()
        .map(|k| {
            registry
                .get("feedback_context", k)
                .unwrap()
                .unwrap()
                .to_string()
        })
        .collect();
    assert_eq!(scanned, looked_up);

    let team_1 = registry
        .scan_filtered(
            "feedback_context",
            &EntryFilter::default().with("teamId", json!("team-1")),
        )
        .unwrap();
    assert_eq!(team_1.len(), 2);
    registry.shutdown();
}

#[tokio::test]
async fn failed_refresh_keeps_previous_snapshot() {
    let registry = ContextRegistry::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    registry
        .register(
            spec("t"),
            loader_fn("flaky", move || {
                let call = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call == 0 {
                        let mut data = TableData::new();
                        data.insert("k".to_string(), json!("v"));
                        Ok(data)
                    } else {
                        Err(ServerError::query_error("connection reset"))
                    }
                }
            }),
        )
        .await
        .unwrap();
    let before = registry.list_tables().remove(0);

    let outcome = registry.refresh_once("t").await.unwrap();
    assert!(outcome.is_failed());

    let after = registry.list_tables().remove(0);
    assert_eq!(after.last_updated, before.last_updated);
    assert_eq!(after.record_count, 1);
    assert_eq!(after.failed_refreshes, 1);
    assert_eq!(registry.get("t", "k").unwrap(), Some(json!("v")));
    registry.shutdown();
}

#[tokio::test]
async fn identical_refreshes_only_advance_last_updated() {
    let registry = ContextRegistry::new();
    registry
        .register(spec("t"), fixed(data(&[("k", json!(1)), ("j", json!(2))])))
        .await
        .unwrap();
    let first = registry.list_tables().remove(0);

    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(registry.refresh_once("t").await.unwrap().is_refreshed());
    let second = registry.list_tables().remove(0);

    assert_eq!(second.record_count, first.record_count);
    assert!(second.last_updated > first.last_updated);
    assert_eq!(registry.scan("t").unwrap().len(), 2);
    registry.shutdown();
}

#[tokio::test(start_paused = true)]
async fn scheduled_failure_keeps_first_load() {
    let registry = ContextRegistry::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let interval = Duration::from_secs(300);
    registry
        .register(
            TableSpec::new("cultural_insights", Duration::from_secs(3600), interval),
            loader_fn("insights", move || {
                let call = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call == 0 {
                        let mut data = TableData::new();
                        data.insert(
                            "team-1_es_tone".to_string(),
                            json!({"insight": "Prefers formal address", "confidence": 0.9}),
                        );
                        Ok(data)
                    } else {
                        Err(ServerError::query_error("deadlock victim"))
                    }
                }
            }),
        )
        .await
        .unwrap();
    let first_load = registry.list_tables()[0].last_updated;
    assert!(first_load.is_some());

    tokio::time::sleep(interval * 2 + Duration::from_secs(1)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        registry.get("cultural_insights", "team-1_es_tone").unwrap().unwrap()["confidence"],
        json!(0.9)
    );
    let info = &registry.list_tables()[0];
    assert_eq!(info.last_updated, first_load);
    assert_eq!(info.failed_refreshes, 2);
    assert_eq!(info.refresh_count, 1);

    registry.shutdown();
    registry.wait_stopped().await;
}

#[tokio::test]
async fn registration_rules() {
    let registry = ContextRegistry::new();
    registry.register(spec("t"), fixed(TableData::new())).await.unwrap();

    assert!(matches!(
        registry.register(spec("t"), fixed(TableData::new())).await,
        Err(ServerError::TableAlreadyRegistered(_))
    ));
    assert!(matches!(
        registry
            .register(
                TableSpec::new("zero", Duration::from_secs(1), Duration::ZERO),
                fixed(TableData::new())
            )
            .await,
        Err(ServerError::InvalidInput(_))
    ));

    assert!(registry.shutdown());
    assert!(!registry.shutdown());
    assert!(matches!(
        registry.register(spec("late"), fixed(TableData::new())).await,
        Err(ServerError::RegistryShutDown)
    ));
    registry.wait_stopped().await;
}

#[tokio::test]
async fn schema_is_reported_when_registered() {
    let registry = ContextRegistry::new();
    registry
        .register(
            spec("with_schema").with_schema(
                TableSchema::new("id")
                    .field("id", FieldType::String)
                    .field("confidence", FieldType::Number),
            ),
            fixed(TableData::new()),
        )
        .await
        .unwrap();
    registry.register(spec("bare"), fixed(TableData::new())).await.unwrap();

    let schema = registry.describe_schema("with_schema").unwrap().unwrap();
    assert_eq!(schema.primary_key(), "id");
    assert_eq!(schema.field_type("confidence"), Some(FieldType::Number));
    assert!(registry.describe_schema("bare").unwrap().is_none());
    registry.shutdown();
}

#[tokio::test(start_paused = true)]
async fn stale_table_is_still_served() {
    let registry = ContextRegistry::new();
    registry
        .register(
            TableSpec::new("team_stats", Duration::from_secs(1), Duration::from_secs(3600)),
            fixed(data(&[("team-1", json!({"totalFeedback": 10}))])),
        )
        .await
        .unwrap();
    assert_eq!(registry.metrics().snapshot().stale_reads, 0);
    assert!(!registry.list_tables()[0].stale);

    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(
        registry.get("team_stats", "team-1").unwrap(),
        Some(json!({"totalFeedback": 10}))
    );
    assert_eq!(registry.metrics().snapshot().stale_reads, 1);
    let info = &registry.list_tables()[0];
    assert!(info.stale);
    assert_eq!(info.record_count, 1);
    assert_eq!(info.refresh_count, 1);
    registry.shutdown();
}
