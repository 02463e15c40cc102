//! Read access to the feedback database.

use super::records::{CulturalInsightRecord, FeedbackRecord, StreamEventRecord, TeamRecord};
use crate::error::ServerError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Queries the standard loaders run against the feedback database.
///
/// Implemented by [`crate::database::MssqlFeedbackStore`] in production and
/// by in-memory doubles in tests.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Feedback created at or after `since`, newest first, with its customer.
    async fn recent_feedback(
        &self,
        since: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<FeedbackRecord>, ServerError>;

    /// Cultural insights created at or after `since`, highest confidence first.
    async fn cultural_insights(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<CulturalInsightRecord>, ServerError>;

    /// Every team.
    async fn teams(&self) -> Result<Vec<TeamRecord>, ServerError>;

    /// Stream events of one type created at or after `since`, newest first.
    async fn stream_events(
        &self,
        event_type: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<StreamEventRecord>, ServerError>;
}

/// Store handle shared by the loaders.
pub type SharedStore = Arc<dyn FeedbackStore>;
