//! Common types used throughout the tap
//!
//! This module contains shared type definitions, type aliases,
//! and utility types used across multiple modules.

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

// ============================================================================
// HTTP Types
// ============================================================================

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    GET,
    POST,
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::GET => reqwest::Method::GET,
            Method::POST => reqwest::Method::POST,
        }
    }
}

// ============================================================================
// Backoff Type
// ============================================================================

/// Type of backoff for retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}

impl BackoffType {
    /// Delay before retry number `attempt` (0-based), capped at `max`
    pub fn delay(self, initial: Duration, max: Duration, attempt: u32) -> Duration {
        let delay = match self {
            BackoffType::Constant => initial,
            BackoffType::Linear => initial.saturating_mul(attempt.saturating_add(1)),
            BackoffType::Exponential => initial.saturating_mul(2u32.saturating_pow(attempt)),
        };
        std::cmp::min(delay, max)
    }
}

// ============================================================================
// Utilities
// ============================================================================

/// Render a scalar JSON value the way it appears in URLs and context keys
///
/// Strings are used verbatim, numbers and booleans via `to_string`.
/// Null, arrays and objects have no scalar form.
pub fn scalar_to_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Look up a dot-separated field path (`record.name`) in a JSON value
pub fn lookup_path<'a>(value: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    if path.is_empty() || path == "$" {
        return Some(value);
    }

    let mut current = value;
    for part in path.split('.') {
        current = match current {
            JsonValue::Object(map) => map.get(part)?,
            JsonValue::Array(arr) => arr.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Look up a field path in a JSON object (a decoded row)
pub fn lookup_field<'a>(row: &'a JsonObject, path: &str) -> Option<&'a JsonValue> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    let value = row.get(head)?;
    match rest {
        Some(rest) => lookup_path(value, rest),
        None => Some(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_conversion() {
        let get: reqwest::Method = Method::GET.into();
        assert_eq!(reqwest::Method::GET, get);
        let post: reqwest::Method = Method::POST.into();
        assert_eq!(reqwest::Method::POST, post);
    }

    #[test]
    fn test_method_default() {
        assert_eq!(Method::default(), Method::GET);
    }

    #[test]
    fn test_backoff_type_serde() {
        let backoff: BackoffType = serde_json::from_str("\"linear\"").unwrap();
        assert_eq!(backoff, BackoffType::Linear);
        assert_eq!(BackoffType::default(), BackoffType::Exponential);
    }

    #[test]
    fn test_scalar_to_string() {
        assert_eq!(scalar_to_string(&json!("abc")), Some("abc".to_string()));
        assert_eq!(scalar_to_string(&json!(101)), Some("101".to_string()));
        assert_eq!(scalar_to_string(&json!(true)), Some("true".to_string()));
        assert_eq!(scalar_to_string(&json!(null)), None);
        assert_eq!(scalar_to_string(&json!({"a": 1})), None);
    }

    #[test]
    fn test_lookup_path() {
        let value = json!({
            "projectId": "p1",
            "record": {"name": "Acme", "owners": ["u1", "u2"]}
        });

        assert_eq!(lookup_path(&value, "projectId"), Some(&json!("p1")));
        assert_eq!(lookup_path(&value, "record.name"), Some(&json!("Acme")));
        assert_eq!(lookup_path(&value, "$.record.owners.1"), Some(&json!("u2")));
        assert_eq!(lookup_path(&value, "$"), Some(&value));
        assert!(lookup_path(&value, "record.missing").is_none());
    }

    #[test]
    fn test_lookup_field() {
        let row = json!({"tagId": "t1", "record": {"tagName": "dsaf"}});
        let row = row.as_object().unwrap();

        assert_eq!(lookup_field(row, "tagId"), Some(&json!("t1")));
        assert_eq!(lookup_field(row, "record.tagName"), Some(&json!("dsaf")));
        assert_eq!(lookup_field(row, "$.record.tagName"), Some(&json!("dsaf")));
        assert!(lookup_field(row, "record.other").is_none());
        assert!(lookup_field(row, "other").is_none());
    }
}
