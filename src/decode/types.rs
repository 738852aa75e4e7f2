//! Decoder types and traits

use crate::error::Result;
use crate::types::{JsonObject, JsonValue};
use serde::{Deserialize, Serialize};

/// How a stream turns a response body into records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReshapeConfig {
    /// Records are already rows: the array at `records_path`, or the body itself
    Passthrough {
        #[serde(default)]
        records_path: Option<String>,
    },

    /// Records are columnar: `ids` + `prop` + `jObj`
    Unfurl {
        /// Key of the field-name → position mapping
        prop_key: String,
        /// Key of the identifier array
        ids_key: String,
        /// Key of the identifier → values mapping
        jobj_key: String,
        /// Field that receives the identifier in every row
        primary_key_name: String,
    },
}

impl Default for ReshapeConfig {
    fn default() -> Self {
        Self::Passthrough { records_path: None }
    }
}

impl ReshapeConfig {
    /// Create a passthrough config reading the array at `path`
    pub fn records_at(path: impl Into<String>) -> Self {
        Self::Passthrough {
            records_path: Some(path.into()),
        }
    }

    /// Create an unfurl config
    pub fn unfurl(
        prop_key: impl Into<String>,
        ids_key: impl Into<String>,
        jobj_key: impl Into<String>,
        primary_key_name: impl Into<String>,
    ) -> Self {
        Self::Unfurl {
            prop_key: prop_key.into(),
            ids_key: ids_key.into(),
            jobj_key: jobj_key.into(),
            primary_key_name: primary_key_name.into(),
        }
    }
}

/// Lazy sequence of rows decoded from one response body
pub type Rows<'a> = Box<dyn Iterator<Item = Result<JsonObject>> + Send + 'a>;

/// Trait for decoding response bodies into records
pub trait RecordDecoder: Send + Sync {
    /// Decode a response body into rows
    ///
    /// Shape errors that make the whole body unusable are returned up front;
    /// errors confined to one row are yielded in its place.
    fn decode<'a>(&'a self, body: &'a JsonValue) -> Result<Rows<'a>>;
}
