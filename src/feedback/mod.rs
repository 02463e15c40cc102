//! Customer feedback context tables.
//!
//! Defines the four standard tables served to agents, their loaders over a
//! [`FeedbackStore`], and the schemas reported by `get_table_schema`.

pub mod entries;
pub mod loaders;
pub mod records;
pub mod schema;
pub mod store;

pub use entries::{AnomalyAlertEntry, CulturalInsightEntry, FeedbackContextEntry, TeamStatsEntry};
pub use loaders::{
    AnomalyAlertsLoader, CulturalInsightsLoader, FeedbackContextLoader, TeamStatsLoader,
};
pub use records::{
    CulturalInsightRecord, CustomerRecord, FeedbackRecord, StreamEventRecord, TeamRecord,
};
pub use store::{FeedbackStore, SharedStore};

use crate::config::ContextConfig;
use crate::constants::{
    ANOMALY_ALERTS_TABLE, CULTURAL_INSIGHTS_TABLE, FEEDBACK_CONTEXT_TABLE, TEAM_STATS_TABLE,
};
use crate::context::{ContextRegistry, RefreshOutcome, TableLoader, TableSpec};
use crate::error::ServerError;
use std::sync::Arc;

/// Definitions and loaders of the four standard tables.
pub fn standard_tables(
    store: SharedStore,
    config: &ContextConfig,
) -> Vec<(TableSpec, Arc<dyn TableLoader>)> {
    let feedback: Arc<dyn TableLoader> = Arc::new(FeedbackContextLoader::new(
        store.clone(),
        config.feedback_window,
        config.feedback_limit,
    ));
    let insights: Arc<dyn TableLoader> =
        Arc::new(CulturalInsightsLoader::new(store.clone(), config.insight_window));
    let team_stats: Arc<dyn TableLoader> =
        Arc::new(TeamStatsLoader::new(store.clone(), config.stats_window));
    let alerts: Arc<dyn TableLoader> = Arc::new(AnomalyAlertsLoader::new(
        store,
        config.alert_window,
        config.alert_limit,
    ));

    vec![
        (
            TableSpec::new(
                FEEDBACK_CONTEXT_TABLE,
                config.feedback.ttl,
                config.feedback.refresh_interval,
            )
            .with_schema(schema::feedback_context_schema()),
            feedback,
        ),
        (
            TableSpec::new(
                CULTURAL_INSIGHTS_TABLE,
                config.insights.ttl,
                config.insights.refresh_interval,
            )
            .with_schema(schema::cultural_insights_schema()),
            insights,
        ),
        (
            TableSpec::new(
                TEAM_STATS_TABLE,
                config.team_stats.ttl,
                config.team_stats.refresh_interval,
            )
            .with_schema(schema::team_stats_schema()),
            team_stats,
        ),
        (
            TableSpec::new(
                ANOMALY_ALERTS_TABLE,
                config.alerts.ttl,
                config.alerts.refresh_interval,
            )
            .with_schema(schema::anomaly_alerts_schema()),
            alerts,
        ),
    ]
}

/// Register the standard tables, returning each initial load outcome.
pub async fn register_standard_tables(
    registry: &ContextRegistry,
    store: SharedStore,
    config: &ContextConfig,
) -> Result<Vec<(String, RefreshOutcome)>, ServerError> {
    let mut outcomes = Vec::new();
    for (spec, loader) in standard_tables(store, config) {
        let name = spec.name.clone();
        let outcome = registry.register(spec, loader).await?;
        outcomes.push((name, outcome));
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    struct EmptyStore;

    #[async_trait]
    impl FeedbackStore for EmptyStore {
        async fn recent_feedback(
            &self,
            _since: DateTime<Utc>,
            _limit: Option<usize>,
        ) -> Result<Vec<FeedbackRecord>, ServerError> {
            Ok(Vec::new())
        }

        async fn cultural_insights(
            &self,
            _since: DateTime<Utc>,
        ) -> Result<Vec<CulturalInsightRecord>, ServerError> {
            Err(ServerError::query_error("Invalid object name 'CulturalInsight'"))
        }

        async fn teams(&self) -> Result<Vec<TeamRecord>, ServerError> {
            Ok(vec![TeamRecord {
                id: "team-1".to_string(),
                name: "Support".to_string(),
            }])
        }

        async fn stream_events(
            &self,
            _event_type: &str,
            _since: DateTime<Utc>,
            _limit: usize,
        ) -> Result<Vec<StreamEventRecord>, ServerError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_register_standard_tables() {
        let registry = ContextRegistry::new();
        let outcomes =
            register_standard_tables(&registry, Arc::new(EmptyStore), &ContextConfig::default())
                .await
                .unwrap();

        let names: Vec<&str> = outcomes.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            [FEEDBACK_CONTEXT_TABLE, CULTURAL_INSIGHTS_TABLE, TEAM_STATS_TABLE, ANOMALY_ALERTS_TABLE]
        );
        assert!(outcomes[1].1.is_failed());
        assert!(outcomes[2].1.is_refreshed());

        assert_eq!(registry.len(), 4);
        assert_eq!(registry.scan(ANOMALY_ALERTS_TABLE).unwrap().len(), 0);
        assert_eq!(
            registry.get(TEAM_STATS_TABLE, "team-1").unwrap().unwrap()["totalFeedback"],
            serde_json::json!(0)
        );
        assert_eq!(
            registry
                .describe_schema(TEAM_STATS_TABLE)
                .unwrap()
                .unwrap()
                .primary_key(),
            "teamId"
        );
        registry.shutdown();
    }
}
