//! Rows read from the feedback database.
//!
//! Field names follow the JSON the store emits (camelCase). Nullable
//! columns are `Option` and default when the key is absent, since
//! `FOR JSON` omits NULL values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A customer attached to a feedback item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// One piece of customer feedback with its AI enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    pub id: String,
    pub team_id: String,
    pub original_text: String,
    #[serde(default)]
    pub translated_text: Option<String>,
    #[serde(default)]
    pub detected_language: Option<String>,
    #[serde(default)]
    pub sentiment: Option<String>,
    #[serde(default)]
    pub cultural_notes: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub rate: Option<f64>,
    #[serde(default)]
    pub is_resolved: bool,
    #[serde(default)]
    pub stream_source: Option<String>,
    #[serde(default)]
    pub customer: Option<CustomerRecord>,
    pub created_at: DateTime<Utc>,
}

/// An aggregated cultural insight for a team and language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CulturalInsightRecord {
    pub id: String,
    pub team_id: String,
    pub language: String,
    #[serde(default)]
    pub region: Option<String>,
    pub insight_type: String,
    pub insight: String,
    pub confidence: f64,
    #[serde(default)]
    pub feedback_count: i64,
    pub created_at: DateTime<Utc>,
}

/// A team that owns feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamRecord {
    pub id: String,
    pub name: String,
}

/// An event recorded by the stream processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEventRecord {
    pub id: String,
    pub event_type: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
}
