//! Field-equality filters for table scans.

use crate::error::ServerError;
use serde_json::{Map, Value};

/// Matches entries whose top-level fields equal every filter field.
///
/// An empty filter matches everything. Entries that are not JSON objects
/// only match the empty filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryFilter {
    criteria: Map<String, Value>,
}

impl EntryFilter {
    /// Build a filter from a JSON object of `field: expected value` pairs.
    pub fn from_json(value: &Value) -> Result<Self, ServerError> {
        match value {
            Value::Object(criteria) => Ok(Self {
                criteria: criteria.clone(),
            }),
            Value::Null => Ok(Self::default()),
            other => Err(ServerError::invalid_input(format!(
                "filter must be a JSON object, got {}",
                json_kind(other)
            ))),
        }
    }

    /// Add a single criterion.
    pub fn with(mut self, field: impl Into<String>, expected: Value) -> Self {
        self.criteria.insert(field.into(), expected);
        self
    }

    /// True when the filter has no criteria.
    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// Check an entry against every criterion.
    pub fn matches(&self, entry: &Value) -> bool {
        if self.criteria.is_empty() {
            return true;
        }
        match entry {
            Value::Object(fields) => self
                .criteria
                .iter()
                .all(|(name, expected)| fields.get(name) == Some(expected)),
            _ => false,
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = EntryFilter::default();
        assert!(filter.is_empty());
        assert!(filter.matches(&json!({"a": 1})));
        assert!(filter.matches(&json!("scalar")));
    }

    #[test]
    fn test_all_criteria_must_match() {
        let filter = EntryFilter::from_json(&json!({"teamId": "team-1", "isResolved": false}))
            .unwrap();

        assert!(filter.matches(&json!({"teamId": "team-1", "isResolved": false, "rating": 5})));
        assert!(!filter.matches(&json!({"teamId": "team-1", "isResolved": true})));
        assert!(!filter.matches(&json!({"teamId": "team-1"})));
        assert!(!filter.matches(&json!([1, 2, 3])));
    }

    #[test]
    fn test_null_filter_is_empty() {
        assert!(EntryFilter::from_json(&Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_non_object_filter_rejected() {
        let err = EntryFilter::from_json(&json!(["teamId"])).unwrap_err();
        assert!(matches!(err, ServerError::InvalidInput(_)));
        assert!(err.to_string().contains("array"));
    }

    #[test]
    fn test_builder_criteria() {
        let filter = EntryFilter::default().with("severity", json!("high"));
        assert!(filter.matches(&json!({"severity": "high"})));
        assert!(!filter.matches(&json!({"severity": "low"})));
    }
}
