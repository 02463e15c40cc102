//! Loaders for the standard context tables.
//!
//! Each loader runs its store query and hands the rows to a pure table
//! builder, so the mapping rules are testable without a database.

use super::entries::{
    AnomalyAlertEntry, CulturalInsightEntry, FeedbackContextEntry, TeamStatsEntry,
};
use super::records::{CulturalInsightRecord, FeedbackRecord, StreamEventRecord, TeamRecord};
use super::store::SharedStore;
use crate::constants::{
    ANOMALY_ALERTS_TABLE, ANOMALY_EVENT_TYPE, CULTURAL_INSIGHTS_TABLE, FEEDBACK_CONTEXT_TABLE,
    TEAM_STATS_TABLE,
};
use crate::context::{TableData, TableLoader};
use crate::error::ServerError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

/// Start of a look-back window ending at `now`.
pub fn window_start(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|w| now.checked_sub_signed(w))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Build `feedback_context` keyed by feedback id.
pub fn feedback_table(records: &[FeedbackRecord]) -> Result<TableData, ServerError> {
    let mut table = TableData::with_capacity(records.len());
    for record in records {
        let entry = FeedbackContextEntry::from(record);
        table.insert(entry.id.clone(), serde_json::to_value(entry)?);
    }
    Ok(table)
}

/// Build `cultural_insights` keyed by `{teamId}_{language}_{insightType}`.
///
/// When several insights share a key the most confident one is kept; on a
/// tie the first one seen wins. The result does not depend on row order, so
/// a lower-confidence row later in the result set never replaces a better
/// one even though the store returns rows sorted by confidence.
pub fn insight_table(records: &[CulturalInsightRecord]) -> Result<TableData, ServerError> {
    let mut best: HashMap<String, CulturalInsightEntry> = HashMap::new();
    for record in records {
        let entry = CulturalInsightEntry::from(record);
        let key = entry.key();
        match best.get(&key) {
            Some(existing) if existing.confidence >= entry.confidence => {}
            _ => {
                best.insert(key, entry);
            }
        }
    }

    let mut table = TableData::with_capacity(best.len());
    for (key, entry) in best {
        table.insert(key, serde_json::to_value(entry)?);
    }
    Ok(table)
}

/// Build `team_stats` keyed by team id. Every team gets an entry, even
/// without feedback; feedback of unknown teams is ignored.
pub fn team_stats_table(
    teams: &[TeamRecord],
    feedback: &[FeedbackRecord],
    now: DateTime<Utc>,
) -> Result<TableData, ServerError> {
    let mut by_team: HashMap<&str, Vec<&FeedbackRecord>> = HashMap::new();
    for record in feedback {
        by_team.entry(record.team_id.as_str()).or_default().push(record);
    }

    let mut table = TableData::with_capacity(teams.len());
    for team in teams {
        let records = by_team.remove(team.id.as_str()).unwrap_or_default();
        let entry = TeamStatsEntry::aggregate(team, records, now);
        table.insert(team.id.clone(), serde_json::to_value(entry)?);
    }
    Ok(table)
}

/// Build `anomaly_alerts` keyed by event id.
pub fn alert_table(events: &[StreamEventRecord]) -> Result<TableData, ServerError> {
    let mut table = TableData::with_capacity(events.len());
    for event in events {
        let entry = AnomalyAlertEntry::from(event);
        table.insert(entry.id.clone(), serde_json::to_value(entry)?);
    }
    Ok(table)
}

/// Loads recent feedback.
pub struct FeedbackContextLoader {
    store: SharedStore,
    window: Duration,
    limit: usize,
}

impl FeedbackContextLoader {
    pub fn new(store: SharedStore, window: Duration, limit: usize) -> Self {
        Self {
            store,
            window,
            limit,
        }
    }
}

#[async_trait]
impl TableLoader for FeedbackContextLoader {
    async fn load(&self) -> Result<TableData, ServerError> {
        let since = window_start(Utc::now(), self.window);
        let records = self.store.recent_feedback(since, Some(self.limit)).await?;
        feedback_table(&records)
    }

    fn describe(&self) -> &str {
        FEEDBACK_CONTEXT_TABLE
    }
}

/// Loads recent cultural insights.
pub struct CulturalInsightsLoader {
    store: SharedStore,
    window: Duration,
}

impl CulturalInsightsLoader {
    pub fn new(store: SharedStore, window: Duration) -> Self {
        Self { store, window }
    }
}

#[async_trait]
impl TableLoader for CulturalInsightsLoader {
    async fn load(&self) -> Result<TableData, ServerError> {
        let since = window_start(Utc::now(), self.window);
        let records = self.store.cultural_insights(since).await?;
        insight_table(&records)
    }

    fn describe(&self) -> &str {
        CULTURAL_INSIGHTS_TABLE
    }
}

/// Aggregates per-team statistics.
pub struct TeamStatsLoader {
    store: SharedStore,
    window: Duration,
}

impl TeamStatsLoader {
    pub fn new(store: SharedStore, window: Duration) -> Self {
        Self { store, window }
    }
}

#[async_trait]
impl TableLoader for TeamStatsLoader {
    async fn load(&self) -> Result<TableData, ServerError> {
        let now = Utc::now();
        let since = window_start(now, self.window);
        let teams = self.store.teams().await?;
        let feedback = self.store.recent_feedback(since, None).await?;
        team_stats_table(&teams, &feedback, now)
    }

    fn describe(&self) -> &str {
        TEAM_STATS_TABLE
    }
}

/// Loads recent anomaly alerts from the stream event log.
pub struct AnomalyAlertsLoader {
    store: SharedStore,
    window: Duration,
    limit: usize,
}

impl AnomalyAlertsLoader {
    pub fn new(store: SharedStore, window: Duration, limit: usize) -> Self {
        Self {
            store,
            window,
            limit,
        }
    }
}

#[async_trait]
impl TableLoader for AnomalyAlertsLoader {
    async fn load(&self) -> Result<TableData, ServerError> {
        let since = window_start(Utc::now(), self.window);
        let events = self
            .store
            .stream_events(ANOMALY_EVENT_TYPE, since, self.limit)
            .await?;
        alert_table(&events)
    }

    fn describe(&self) -> &str {
        ANOMALY_ALERTS_TABLE
    }
}
