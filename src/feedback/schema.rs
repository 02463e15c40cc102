//! Field descriptions of the standard context tables.

use crate::context::{FieldType, TableSchema};

/// Schema of `feedback_context`.
pub fn feedback_context_schema() -> TableSchema {
    TableSchema::new("id")
        .field("id", FieldType::String)
        .field("teamId", FieldType::String)
        .field("text", FieldType::String)
        .field("originalText", FieldType::String)
        .field("language", FieldType::String)
        .field("sentiment", FieldType::String)
        .field("culturalNotes", FieldType::String)
        .field("summary", FieldType::String)
        .field("rating", FieldType::Number)
        .field("isResolved", FieldType::Boolean)
        .field("streamSource", FieldType::String)
        .field("customer", FieldType::Object)
        .field("createdAt", FieldType::Datetime)
}

/// Schema of `cultural_insights`.
pub fn cultural_insights_schema() -> TableSchema {
    TableSchema::new("id")
        .field("id", FieldType::String)
        .field("teamId", FieldType::String)
        .field("language", FieldType::String)
        .field("region", FieldType::String)
        .field("insightType", FieldType::String)
        .field("insight", FieldType::String)
        .field("confidence", FieldType::Number)
        .field("feedbackCount", FieldType::Number)
        .field("createdAt", FieldType::Datetime)
}

/// Schema of `team_stats`.
pub fn team_stats_schema() -> TableSchema {
    TableSchema::new("teamId")
        .field("teamId", FieldType::String)
        .field("teamName", FieldType::String)
        .field("totalFeedback", FieldType::Number)
        .field("sentimentBreakdown", FieldType::Object)
        .field("languageBreakdown", FieldType::Object)
        .field("averageRating", FieldType::Number)
        .field("resolvedCount", FieldType::Number)
        .field("streamingCount", FieldType::Number)
        .field("lastUpdated", FieldType::Datetime)
}

/// Schema of `anomaly_alerts`.
pub fn anomaly_alerts_schema() -> TableSchema {
    TableSchema::new("id")
        .field("id", FieldType::String)
        .field("teamId", FieldType::String)
        .field("anomalyType", FieldType::String)
        .field("severity", FieldType::String)
        .field("reasoning", FieldType::String)
        .field("feedbackId", FieldType::String)
        .field("status", FieldType::String)
        .field("createdAt", FieldType::Datetime)
}
