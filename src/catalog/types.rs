//! Catalog types
//!
//! Declarative stream definitions for YAML parsing.

use crate::decode::ReshapeConfig;
use crate::error::{Error, Result};
use crate::pagination::PaginationConfig;
use crate::template::Context;
use crate::types::{lookup_field, scalar_to_string, JsonObject, JsonValue, Method};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

// ============================================================================
// Catalog
// ============================================================================

/// The full table of streams one API exposes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Catalog {
    /// Catalog name
    pub name: String,
    /// Catalog version
    #[serde(default = "default_version")]
    pub version: String,
    /// Stream definitions, parents before children
    pub streams: Vec<StreamDefinition>,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

impl Catalog {
    /// Look up a stream by name
    pub fn get(&self, name: &str) -> Option<&StreamDefinition> {
        self.streams.iter().find(|s| s.name == name)
    }

    /// Look up a stream, failing with `StreamNotFound`
    pub fn require(&self, name: &str) -> Result<&StreamDefinition> {
        self.get(name).ok_or_else(|| Error::stream_not_found(name))
    }

    /// Streams with no parent
    pub fn roots(&self) -> impl Iterator<Item = &StreamDefinition> {
        self.streams.iter().filter(|s| s.is_root())
    }

    /// Direct children of a stream, in catalog order
    pub fn children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a StreamDefinition> {
        self.streams
            .iter()
            .filter(move |s| s.parent.as_deref() == Some(name))
    }

    /// Ancestors of a stream, nearest first
    pub fn ancestors(&self, name: &str) -> Vec<&StreamDefinition> {
        let mut out = Vec::new();
        let mut current = self.get(name).and_then(|s| s.parent.as_deref());
        while let Some(parent) = current {
            match self.get(parent) {
                // stop on a cycle
                Some(def) if !out.iter().any(|d: &&StreamDefinition| d.name == def.name) => {
                    out.push(def);
                    current = def.parent.as_deref();
                }
                _ => break,
            }
        }
        out
    }

    /// All stream names, in catalog order
    pub fn names(&self) -> Vec<&str> {
        self.streams.iter().map(|s| s.name.as_str()).collect()
    }

    /// Resolve a stream selection
    ///
    /// An empty selection selects every stream.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Selection> {
        if names.is_empty() {
            let all: HashSet<String> = self.streams.iter().map(|s| s.name.clone()).collect();
            return Ok(Selection {
                emit: all.clone(),
                traverse: all,
            });
        }

        let mut emit = HashSet::new();
        let mut traverse = HashSet::new();
        for name in names {
            let def = self.require(name.as_ref())?;
            emit.insert(def.name.clone());
            traverse.insert(def.name.clone());
            for ancestor in self.ancestors(&def.name) {
                traverse.insert(ancestor.name.clone());
            }
        }

        Ok(Selection { emit, traverse })
    }
}

/// Which streams a run visits and which it emits
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Streams whose records reach the sink
    pub emit: HashSet<String>,
    /// Streams that are requested: the emitted ones plus their ancestors
    pub traverse: HashSet<String>,
}

impl Selection {
    pub fn emits(&self, stream: &str) -> bool {
        self.emit.contains(stream)
    }

    pub fn traverses(&self, stream: &str) -> bool {
        self.traverse.contains(stream)
    }
}

// ============================================================================
// Stream Definition
// ============================================================================

/// Immutable descriptor of one stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StreamDefinition {
    /// Stream name
    pub name: String,
    /// URL path, `{{ key }}` placeholders resolved from the context
    pub path: String,
    /// Parent stream, none for roots
    #[serde(default)]
    pub parent: Option<String>,
    /// Primary key field path
    #[serde(default)]
    pub primary_key: Option<String>,
    /// HTTP method (POST when a payload is declared)
    #[serde(default)]
    pub method: Method,
    /// Static query parameters (values may use templates)
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// Pagination mode
    #[serde(default)]
    pub pagination: PaginationConfig,
    /// Reshape mode
    #[serde(default)]
    pub reshape: ReshapeConfig,
    /// Context handed to children: child key → record field path
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Field path of the incremental replication value
    #[serde(default)]
    pub replication_key: Option<String>,
    /// JSON request body
    #[serde(default)]
    pub payload: Option<JsonValue>,
}

impl StreamDefinition {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Effective HTTP method
    pub fn method(&self) -> Method {
        if self.payload.is_some() {
            Method::POST
        } else {
            self.method
        }
    }

    /// Derive the context for this stream's children from one of its records
    ///
    /// The parent's bindings are kept; keys declared here are added (or
    /// rebound) with values read from the record.
    pub fn child_context(&self, parent: &Context, record: &JsonObject) -> Result<Context> {
        let mut ctx = parent.clone();
        for (key, path) in &self.context {
            let value = lookup_field(record, path)
                .and_then(scalar_to_string)
                .ok_or_else(|| {
                    Error::parse(format!(
                        "record of stream '{}' has no scalar '{path}' for context key '{key}'",
                        self.name
                    ))
                })?;
            ctx = ctx.with(key.clone(), value);
        }
        Ok(ctx)
    }

    /// Primary key value of a record, if the stream declares one
    pub fn primary_key_value<'a>(&self, record: &'a JsonObject) -> Option<&'a JsonValue> {
        self.primary_key
            .as_deref()
            .and_then(|path| lookup_field(record, path))
    }

    /// Replication value of a record, if the stream is incremental
    pub fn replication_value<'a>(&self, record: &'a JsonObject) -> Option<&'a JsonValue> {
        self.replication_key
            .as_deref()
            .and_then(|path| lookup_field(record, path))
    }
}
