//! State types for tracking sync progress
//!
//! These types are serialized to JSON and persisted between runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Complete state for a tap
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// Per-stream bookmarks
    #[serde(default)]
    pub bookmarks: BTreeMap<String, StreamState>,
}

impl State {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get state for a stream
    pub fn get_stream(&self, stream: &str) -> Option<&StreamState> {
        self.bookmarks.get(stream)
    }

    /// Get mutable state for a stream, creating if needed
    pub fn get_stream_mut(&mut self, stream: &str) -> &mut StreamState {
        self.bookmarks.entry(stream.to_string()).or_default()
    }

    /// Bookmark of one stream instance
    pub fn get_bookmark(&self, stream: &str, partition: &str) -> Option<&str> {
        self.bookmarks
            .get(stream)?
            .partitions
            .get(partition)?
            .bookmark
            .as_deref()
    }

    /// Move a bookmark forward; a value that is not newer is ignored
    ///
    /// Returns whether the bookmark changed.
    pub fn advance_bookmark(&mut self, stream: &str, partition: &str, value: &str) -> bool {
        let slot = &mut self
            .get_stream_mut(stream)
            .partitions
            .entry(partition.to_string())
            .or_default()
            .bookmark;

        let newer = match slot.as_deref() {
            Some(current) => compare_replication(value, current) == Ordering::Greater,
            None => true,
        };
        if newer {
            *slot = Some(value.to_string());
        }
        newer
    }
}

/// State for a single stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamState {
    /// Per-context state, keyed by the context's partition key
    #[serde(default)]
    pub partitions: BTreeMap<String, PartitionState>,
}

/// State for a single stream instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionState {
    /// Highest replication value emitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bookmark: Option<String>,
}

// ============================================================================
// Replication values
// ============================================================================

/// A replication value interpreted for ordering
///
/// Numbers are epoch timestamps (seconds below 10^11, otherwise
/// milliseconds) so they compare against RFC 3339 times.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplicationValue {
    /// Epoch milliseconds
    Millis(f64),
    /// Anything else, compared as text
    Text(String),
}

impl ReplicationValue {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(n) = trimmed.parse::<f64>() {
            if n.is_finite() {
                let millis = if n.abs() < 1e11 { n * 1000.0 } else { n };
                return Self::Millis(millis);
            }
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Self::Millis(dt.with_timezone(&Utc).timestamp_millis() as f64);
        }
        Self::Text(raw.to_string())
    }
}

/// Order two replication values
pub fn compare_replication(a: &str, b: &str) -> Ordering {
    compare_values(&ReplicationValue::parse(a), &ReplicationValue::parse(b), a, b)
}

fn compare_values(a: &ReplicationValue, b: &ReplicationValue, raw_a: &str, raw_b: &str) -> Ordering {
    match (a, b) {
        (ReplicationValue::Millis(x), ReplicationValue::Millis(y)) => {
            x.partial_cmp(y).unwrap_or(Ordering::Equal)
        }
        _ => raw_a.cmp(raw_b),
    }
}

/// Check whether a record's replication value is older than where this run starts
///
/// The start is the stream instance's bookmark, or `start_date` when there
/// is none. Values that cannot be compared with `start_date` are kept.
pub fn is_before_start(value: &str, bookmark: Option<&str>, start_date: Option<DateTime<Utc>>) -> bool {
    if let Some(bookmark) = bookmark {
        return compare_replication(value, bookmark) == Ordering::Less;
    }
    match (ReplicationValue::parse(value), start_date) {
        (ReplicationValue::Millis(v), Some(start)) => v < start.timestamp_millis() as f64,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_state_default() {
        let state = State::new();
        assert!(state.bookmarks.is_empty());
        assert!(state.get_bookmark("items", "").is_none());
    }

    #[test]
    fn test_advance_bookmark_only_moves_forward() {
        let mut state = State::new();
        let partition = "teamId=1;projectId=2;sprintId=3";

        assert!(state.advance_bookmark("items", partition, "1700000000000"));
        assert!(!state.advance_bookmark("items", partition, "1600000000000"));
        assert!(!state.advance_bookmark("items", partition, "1700000000000"));
        assert!(state.advance_bookmark("items", partition, "1800000000000"));

        assert_eq!(state.get_bookmark("items", partition), Some("1800000000000"));
        assert!(state.get_bookmark("items", "other").is_none());
    }

    #[test]
    fn test_numeric_values_compare_numerically() {
        assert_eq!(compare_replication("9", "10"), Ordering::Less);
        assert_eq!(compare_replication("1700000000000", "999999999999"), Ordering::Greater);
    }

    #[test]
    fn test_mixed_time_formats() {
        // 2023-11-14T22:13:20Z
        assert_eq!(
            compare_replication("1700000000000", "2023-11-14T22:13:20Z"),
            Ordering::Equal
        );
        assert_eq!(
            compare_replication("1700000000", "2024-01-01T00:00:00Z"),
            Ordering::Less
        );
    }

    #[test]
    fn test_text_values_compare_lexically() {
        assert_eq!(compare_replication("abc", "abd"), Ordering::Less);
    }

    #[test]
    fn test_is_before_start() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        assert!(is_before_start("2023-12-31T23:59:59Z", None, Some(start)));
        assert!(!is_before_start("2024-01-01T00:00:00Z", None, Some(start)));
        assert!(is_before_start("1600000000000", None, Some(start)));
        assert!(!is_before_start("not a time", None, Some(start)));
        assert!(!is_before_start("1600000000000", None, None));

        // The bookmark wins over start_date
        assert!(!is_before_start("1600000000000", Some("1500000000000"), Some(start)));
        assert!(is_before_start("1400000000000", Some("1500000000000"), Some(start)));
        assert!(!is_before_start("1500000000000", Some("1500000000000"), None));
    }

    #[test]
    fn test_state_serde_shape() {
        let mut state = State::new();
        state.advance_bookmark("items", "teamId=1", "42");
        state.get_stream_mut("teams");

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "bookmarks": {
                    "items": {"partitions": {"teamId=1": {"bookmark": "42"}}},
                    "teams": {"partitions": {}}
                }
            })
        );

        let back: State = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}
