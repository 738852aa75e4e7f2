//! Path templates and traversal context
//!
//! Stream paths carry `{{ key }}` placeholders (e.g. `/team/{{ teamId }}/projects/`)
//! that are resolved from the [`Context`] accumulated while walking from a root
//! record down to a child stream.

use crate::error::{Error, Result};
use crate::types::JsonValue;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

/// Regex for matching template variables: {{ variable }}
static TEMPLATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*)\s*\}\}").expect("template regex is valid")
});

/// Ancestor bindings passed from a parent record to its child streams
///
/// Keys keep insertion order (root first). A context is never mutated once
/// handed to a child: [`Context::with`] returns a new value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Context {
    entries: Vec<(String, String)>,
}

impl Context {
    /// Create an empty context (used for root streams)
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy of this context with `key` bound to `value`
    ///
    /// Rebinding an existing key replaces its value in place.
    #[must_use]
    pub fn with(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        let mut entries = self.entries.clone();
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => entries.push((key, value)),
        }
        Self { entries }
    }

    /// Get a bound value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over bindings in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stable identifier for this context, used as the state partition key
    pub fn partition_key(&self) -> String {
        if self.entries.is_empty() {
            return String::new();
        }
        self.entries
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Context as a JSON object
    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(
            self.entries
                .iter()
                .map(|(k, v)| (k.clone(), JsonValue::String(v.clone())))
                .collect(),
        )
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return f.write_str("{}");
        }
        write!(f, "{{{}}}", self.partition_key())
    }
}

/// Render a template string with the given context
pub fn render(template: &str, ctx: &Context) -> Result<String> {
    let mut missing = Vec::new();

    let rendered = TEMPLATE_REGEX.replace_all(template, |caps: &regex::Captures<'_>| {
        let key = &caps[1];
        match ctx.get(key) {
            Some(value) => value.to_string(),
            None => {
                missing.push(key.to_string());
                String::new()
            }
        }
    });

    if missing.is_empty() {
        Ok(rendered.into_owned())
    } else {
        Err(Error::undefined_var(missing.join(", ")))
    }
}

/// Check if a string contains template variables
pub fn has_templates(s: &str) -> bool {
    TEMPLATE_REGEX.is_match(s)
}

/// Extract all variable names from a template
pub fn extract_variables(template: &str) -> Vec<String> {
    TEMPLATE_REGEX
        .captures_iter(template)
        .map(|cap| cap[1].to_string())
        .collect()
}
