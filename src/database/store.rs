//! SQL Server implementation of [`FeedbackStore`].
//!
//! Every query ends in `FOR JSON PATH`, so SQL Server does the row shaping
//! and the records decode with serde. Timestamps are returned with an
//! explicit UTC offset so they parse as `DateTime<Utc>`.

use super::connection::{pool_status, ConnectionPool, PoolStatus};
use crate::error::ServerError;
use crate::feedback::{
    CulturalInsightRecord, FeedbackRecord, FeedbackStore, StreamEventRecord, TeamRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use serde::de::DeserializeOwned;
use std::time::Instant;
use tracing::debug;

/// Feedback store backed by a SQL Server connection pool.
pub struct MssqlFeedbackStore {
    pool: ConnectionPool,
}

impl MssqlFeedbackStore {
    /// Wrap an existing pool.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Current pool utilisation.
    pub fn pool_status(&self) -> PoolStatus {
        pool_status(&self.pool)
    }

    /// Run a `FOR JSON` query and decode the concatenated document.
    async fn query_json<T: DeserializeOwned>(
        &self,
        what: &str,
        sql: &str,
    ) -> Result<Vec<T>, ServerError> {
        let start = Instant::now();
        let mut conn = self.pool.get().await?;

        let stream = conn
            .query(sql, &[])
            .await
            .map_err(|e| ServerError::query_error(format!("Query for {} failed: {}", what, e)))?;
        let rows: Vec<mssql_client::Row> = stream.try_collect().await.map_err(|e| {
            ServerError::query_error(format!("Failed to collect {} results: {}", what, e))
        })?;

        // FOR JSON splits long documents across rows of one column.
        let mut document = String::new();
        for row in &rows {
            if let Some(chunk) = row.try_get::<String>(0) {
                document.push_str(&chunk);
            }
        }

        let records = decode_json_rows(what, &document)?;
        debug!(
            what,
            records = records.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded rows from SQL Server"
        );
        Ok(records)
    }
}

#[async_trait]
impl FeedbackStore for MssqlFeedbackStore {
    async fn recent_feedback(
        &self,
        since: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<FeedbackRecord>, ServerError> {
        self.query_json("feedback", &recent_feedback_sql(since, limit))
            .await
    }

    async fn cultural_insights(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<CulturalInsightRecord>, ServerError> {
        self.query_json("cultural insights", &cultural_insights_sql(since))
            .await
    }

    async fn teams(&self) -> Result<Vec<TeamRecord>, ServerError> {
        self.query_json("teams", TEAMS_SQL).await
    }

    async fn stream_events(
        &self,
        event_type: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<StreamEventRecord>, ServerError> {
        self.query_json("stream events", &stream_events_sql(event_type, since, limit))
            .await
    }
}

const TEAMS_SQL: &str = "SELECT t.id, t.name FROM Team t ORDER BY t.name FOR JSON PATH";

fn recent_feedback_sql(since: DateTime<Utc>, limit: Option<usize>) -> String {
    let top = limit.map(|n| format!("TOP ({}) ", n)).unwrap_or_default();
    format!(
        "SELECT {top}f.id, f.teamId, f.originalText, f.translatedText, f.detectedLanguage, \
         f.sentiment, f.culturalNotes, f.summary, f.rate, f.isResolved, f.streamSource, \
         c.id AS [customer.id], c.name AS [customer.name], c.email AS [customer.email], \
         f.createdAt AT TIME ZONE 'UTC' AS createdAt \
         FROM Feedback f LEFT JOIN Customer c ON c.id = f.customerId \
         WHERE f.createdAt >= {since} \
         ORDER BY f.createdAt DESC \
         FOR JSON PATH",
        since = datetime_literal(since),
    )
}

fn cultural_insights_sql(since: DateTime<Utc>) -> String {
    format!(
        "SELECT i.id, i.teamId, i.language, i.region, i.insightType, i.insight, \
         i.confidence, i.feedbackCount, i.createdAt AT TIME ZONE 'UTC' AS createdAt \
         FROM CulturalInsight i \
         WHERE i.createdAt >= {} \
         ORDER BY i.confidence DESC \
         FOR JSON PATH",
        datetime_literal(since),
    )
}

fn stream_events_sql(event_type: &str, since: DateTime<Utc>, limit: usize) -> String {
    format!(
        "SELECT TOP ({limit}) e.id, e.eventType, JSON_QUERY(e.payload) AS payload, e.status, \
         e.createdAt AT TIME ZONE 'UTC' AS createdAt \
         FROM StreamEvent e \
         WHERE e.eventType = {event_type} AND e.createdAt >= {since} \
         ORDER BY e.createdAt DESC \
         FOR JSON PATH",
        event_type = string_literal(event_type),
        since = datetime_literal(since),
    )
}

/// Render a UTC timestamp as a `datetime2` literal.
fn datetime_literal(at: DateTime<Utc>) -> String {
    format!("'{}'", at.format("%Y-%m-%dT%H:%M:%S%.3f"))
}

/// Render a Unicode string literal with quotes escaped.
fn string_literal(value: &str) -> String {
    format!("N'{}'", value.replace('\'', "''"))
}

/// Decode a `FOR JSON` document. No rows produce no document at all.
pub(crate) fn decode_json_rows<T: DeserializeOwned>(
    what: &str,
    document: &str,
) -> Result<Vec<T>, ServerError> {
    if document.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(document).map_err(|e| ServerError::decode(what, e.to_string()))
}
