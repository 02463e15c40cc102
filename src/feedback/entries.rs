//! Projections stored in the standard context tables.

use super::records::{
    CulturalInsightRecord, CustomerRecord, FeedbackRecord, StreamEventRecord, TeamRecord,
};
use crate::constants::{DEFAULT_LANGUAGE, DEFAULT_SENTIMENT, KAFKA_STREAM_SOURCE};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Entry of `feedback_context`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackContextEntry {
    pub id: String,
    pub team_id: String,
    /// Translated text when available, otherwise the original.
    pub text: String,
    pub original_text: String,
    pub language: Option<String>,
    pub sentiment: Option<String>,
    pub cultural_notes: Option<String>,
    pub summary: Option<String>,
    pub rating: Option<f64>,
    pub is_resolved: bool,
    pub stream_source: Option<String>,
    pub customer: Option<CustomerRecord>,
    pub created_at: DateTime<Utc>,
}

impl From<&FeedbackRecord> for FeedbackContextEntry {
    fn from(record: &FeedbackRecord) -> Self {
        Self {
            id: record.id.clone(),
            team_id: record.team_id.clone(),
            text: record
                .translated_text
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| record.original_text.clone()),
            original_text: record.original_text.clone(),
            language: record.detected_language.clone(),
            sentiment: record.sentiment.clone(),
            cultural_notes: record.cultural_notes.clone(),
            summary: record.summary.clone(),
            rating: record.rate,
            is_resolved: record.is_resolved,
            stream_source: record.stream_source.clone(),
            customer: record.customer.clone(),
            created_at: record.created_at,
        }
    }
}

/// Entry of `cultural_insights`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CulturalInsightEntry {
    pub id: String,
    pub team_id: String,
    pub language: String,
    pub region: Option<String>,
    pub insight_type: String,
    pub insight: String,
    pub confidence: f64,
    pub feedback_count: i64,
    pub created_at: DateTime<Utc>,
}

impl CulturalInsightEntry {
    /// Table key: `{teamId}_{language}_{insightType}`.
    pub fn key(&self) -> String {
        format!("{}_{}_{}", self.team_id, self.language, self.insight_type)
    }
}

impl From<&CulturalInsightRecord> for CulturalInsightEntry {
    fn from(record: &CulturalInsightRecord) -> Self {
        Self {
            id: record.id.clone(),
            team_id: record.team_id.clone(),
            language: record.language.clone(),
            region: record.region.clone(),
            insight_type: record.insight_type.clone(),
            insight: record.insight.clone(),
            confidence: record.confidence,
            feedback_count: record.feedback_count,
            created_at: record.created_at,
        }
    }
}

/// Entry of `team_stats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamStatsEntry {
    pub team_id: String,
    pub team_name: String,
    pub total_feedback: usize,
    pub sentiment_breakdown: BTreeMap<String, usize>,
    pub language_breakdown: BTreeMap<String, usize>,
    pub average_rating: f64,
    pub resolved_count: usize,
    pub streaming_count: usize,
    pub last_updated: DateTime<Utc>,
}

impl TeamStatsEntry {
    /// Aggregate one team's feedback.
    ///
    /// Unclassified sentiment counts as neutral, undetected language as
    /// English, and a missing rating as zero.
    pub fn aggregate<'a>(
        team: &TeamRecord,
        feedback: impl IntoIterator<Item = &'a FeedbackRecord>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut entry = Self {
            team_id: team.id.clone(),
            team_name: team.name.clone(),
            total_feedback: 0,
            sentiment_breakdown: BTreeMap::new(),
            language_breakdown: BTreeMap::new(),
            average_rating: 0.0,
            resolved_count: 0,
            streaming_count: 0,
            last_updated: now,
        };

        let mut rating_sum = 0.0;
        for f in feedback {
            entry.total_feedback += 1;
            let sentiment = f.sentiment.as_deref().unwrap_or(DEFAULT_SENTIMENT);
            *entry
                .sentiment_breakdown
                .entry(sentiment.to_string())
                .or_default() += 1;
            let language = f.detected_language.as_deref().unwrap_or(DEFAULT_LANGUAGE);
            *entry
                .language_breakdown
                .entry(language.to_string())
                .or_default() += 1;
            rating_sum += f.rate.unwrap_or(0.0);
            if f.is_resolved {
                entry.resolved_count += 1;
            }
            if f.stream_source.as_deref() == Some(KAFKA_STREAM_SOURCE) {
                entry.streaming_count += 1;
            }
        }

        if entry.total_feedback > 0 {
            let average = rating_sum / entry.total_feedback as f64;
            entry.average_rating = (average * 10.0).round() / 10.0;
        }
        entry
    }
}

/// Entry of `anomaly_alerts`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyAlertEntry {
    pub id: String,
    pub team_id: Option<String>,
    pub anomaly_type: Option<String>,
    pub severity: Option<String>,
    pub reasoning: Option<String>,
    pub feedback_id: Option<String>,
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&StreamEventRecord> for AnomalyAlertEntry {
    fn from(event: &StreamEventRecord) -> Self {
        let field = |name: &str| payload_text(&event.payload, name);
        Self {
            id: event.id.clone(),
            team_id: field("teamId"),
            anomaly_type: field("anomalyType"),
            severity: field("severity"),
            reasoning: field("reasoning"),
            feedback_id: field("feedbackId"),
            status: event.status.clone(),
            created_at: event.created_at,
        }
    }
}

/// Read a payload field as text. Scalars are stringified; null, missing
/// and structured values yield `None`.
fn payload_text(payload: &Value, name: &str) -> Option<String> {
    match payload.get(name)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
