//! Centralized constants for the feedback context server.
//!
//! Default schedules, look-back windows and limits for the context tables
//! live here so they are easy to find and tune.

use std::time::Duration;

// =============================================================================
// Table Names
// =============================================================================

/// Recent feedback projections, keyed by feedback id.
pub const FEEDBACK_CONTEXT_TABLE: &str = "feedback_context";

/// AI-derived cultural insights, keyed by `{teamId}_{language}_{insightType}`.
pub const CULTURAL_INSIGHTS_TABLE: &str = "cultural_insights";

/// Per-team aggregate statistics, keyed by team id.
pub const TEAM_STATS_TABLE: &str = "team_stats";

/// Recent anomaly alerts from the stream processor, keyed by event id.
pub const ANOMALY_ALERTS_TABLE: &str = "anomaly_alerts";

// =============================================================================
// Table Schedules
// =============================================================================

/// Feedback context staleness threshold (5 minutes).
pub const FEEDBACK_CONTEXT_TTL: Duration = Duration::from_secs(5 * 60);

/// Feedback context refresh interval.
pub const FEEDBACK_CONTEXT_REFRESH: Duration = Duration::from_secs(30);

/// Cultural insights staleness threshold (15 minutes).
pub const CULTURAL_INSIGHTS_TTL: Duration = Duration::from_secs(15 * 60);

/// Cultural insights refresh interval.
pub const CULTURAL_INSIGHTS_REFRESH: Duration = Duration::from_secs(2 * 60);

/// Team statistics staleness threshold (10 minutes).
pub const TEAM_STATS_TTL: Duration = Duration::from_secs(10 * 60);

/// Team statistics refresh interval.
pub const TEAM_STATS_REFRESH: Duration = Duration::from_secs(60);

/// Anomaly alerts staleness threshold (2 minutes).
pub const ANOMALY_ALERTS_TTL: Duration = Duration::from_secs(2 * 60);

/// Anomaly alerts refresh interval.
pub const ANOMALY_ALERTS_REFRESH: Duration = Duration::from_secs(15);

/// Upper bound on a single table load before it counts as failed.
pub const DEFAULT_LOAD_TIMEOUT_SECS: u64 = 30;

/// Default load timeout as Duration.
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(DEFAULT_LOAD_TIMEOUT_SECS);

// =============================================================================
// Loader Windows and Limits
// =============================================================================

/// How far back the feedback context looks, in hours.
pub const DEFAULT_FEEDBACK_WINDOW_HOURS: i64 = 24;

/// Maximum feedback rows loaded per refresh.
pub const DEFAULT_FEEDBACK_LIMIT: usize = 1000;

/// How far back cultural insights are loaded, in days.
pub const DEFAULT_INSIGHT_WINDOW_DAYS: i64 = 7;

/// Window aggregated into team statistics, in hours.
pub const DEFAULT_STATS_WINDOW_HOURS: i64 = 24;

/// How far back anomaly alerts are loaded, in minutes.
pub const DEFAULT_ALERT_WINDOW_MINUTES: i64 = 60;

/// Maximum anomaly alerts loaded per refresh.
pub const DEFAULT_ALERT_LIMIT: usize = 100;

/// Stream event type that marks an anomaly alert.
pub const ANOMALY_EVENT_TYPE: &str = "anomaly_detected";

/// Stream source recorded on feedback that arrived through Kafka.
pub const KAFKA_STREAM_SOURCE: &str = "kafka";

/// Sentiment bucket used when feedback has not been classified.
pub const DEFAULT_SENTIMENT: &str = "neutral";

/// Language bucket used when no language was detected.
pub const DEFAULT_LANGUAGE: &str = "en";

// =============================================================================
// Database Constants
// =============================================================================

/// Default SQL Server port.
pub const DEFAULT_MSSQL_PORT: u16 = 1433;

/// Default feedback database name.
pub const DEFAULT_DATABASE: &str = "feedback";

/// Default connection timeout in seconds.
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Default connection timeout as Duration.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration =
    Duration::from_secs(DEFAULT_CONNECTION_TIMEOUT_SECS);

/// Default minimum connections in pool.
pub const DEFAULT_MIN_CONNECTIONS: u32 = 1;

/// Default maximum connections in pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Default connection idle timeout in seconds.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;

// =============================================================================
// HTTP Constants
// =============================================================================

/// Default HTTP bind host.
pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";

/// Default HTTP port.
pub const DEFAULT_HTTP_PORT: u16 = 3100;

// =============================================================================
// Shutdown Constants
// =============================================================================

/// Default shutdown drain timeout in seconds.
pub const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 10;

/// Default shutdown drain timeout as Duration.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(DEFAULT_DRAIN_TIMEOUT_SECS);

// =============================================================================
// Percentage Constants (for calculations)
// =============================================================================

/// Percentage multiplier for rate calculations.
pub const PERCENTAGE_MULTIPLIER: f64 = 100.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_is_shorter_than_ttl() {
        assert!(FEEDBACK_CONTEXT_REFRESH < FEEDBACK_CONTEXT_TTL);
        assert!(CULTURAL_INSIGHTS_REFRESH < CULTURAL_INSIGHTS_TTL);
        assert!(TEAM_STATS_REFRESH < TEAM_STATS_TTL);
        assert!(ANOMALY_ALERTS_REFRESH < ANOMALY_ALERTS_TTL);
    }

    #[test]
    fn test_table_names_are_distinct() {
        let names = [
            FEEDBACK_CONTEXT_TABLE,
            CULTURAL_INSIGHTS_TABLE,
            TEAM_STATS_TABLE,
            ANOMALY_ALERTS_TABLE,
        ];
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_timeout_durations() {
        assert_eq!(DEFAULT_LOAD_TIMEOUT, Duration::from_secs(30));
        assert_eq!(DEFAULT_CONNECTION_TIMEOUT, Duration::from_secs(30));
        assert_eq!(DEFAULT_DRAIN_TIMEOUT, Duration::from_secs(10));
    }
}
