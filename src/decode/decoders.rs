//! Decoder implementations
//!
//! Each decoder handles a specific response encoding.

use super::types::{RecordDecoder, ReshapeConfig, Rows};
use crate::error::{Error, Result};
use crate::types::{lookup_path, scalar_to_string, JsonObject, JsonValue};

/// Key under which unfurled entity fields are nested
pub const RECORD_KEY: &str = "record";

// ============================================================================
// Passthrough Decoder
// ============================================================================

/// Rows that are already JSON objects
#[derive(Debug, Clone, Default)]
pub struct PassthroughDecoder {
    /// Path of the record array
    records_path: Option<String>,
}

impl PassthroughDecoder {
    /// Create a decoder that treats the whole body as the records
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder with a record path
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            records_path: Some(path.into()),
        }
    }
}

impl RecordDecoder for PassthroughDecoder {
    fn decode<'a>(&'a self, body: &'a JsonValue) -> Result<Rows<'a>> {
        let target = match &self.records_path {
            Some(path) => match lookup_path(body, path) {
                Some(value) => value,
                None => return Ok(Box::new(std::iter::empty())),
            },
            None => body,
        };

        match target {
            JsonValue::Array(items) => Ok(Box::new(items.iter().enumerate().map(|(i, item)| {
                item.as_object()
                    .cloned()
                    .ok_or_else(|| Error::parse(format!("record {i} is not an object: {item}")))
            }))),
            JsonValue::Object(map) => Ok(Box::new(std::iter::once(Ok(map.clone())))),
            JsonValue::Null => Ok(Box::new(std::iter::empty())),
            other => Err(Error::parse(format!("expected records, found {other}"))),
        }
    }
}

// ============================================================================
// Unfurl Decoder
// ============================================================================

/// Columnar-to-row reshaping
///
/// ```text
/// {"projectIds": ["p1"], "project_prop": {"name": 0}, "projectJObj": {"p1": ["Acme"]}, "next": false}
/// =>
/// {"projectId": "p1", "record": {"name": "Acme"}, "next": false}
/// ```
///
/// Every row starts from the body without the three columnar keys. The
/// entity fields go under `record` so they cannot overwrite root fields.
#[derive(Debug, Clone)]
pub struct UnfurlDecoder {
    pub prop_key: String,
    pub ids_key: String,
    pub jobj_key: String,
    pub primary_key_name: String,
}

impl UnfurlDecoder {
    pub fn new(
        prop_key: impl Into<String>,
        ids_key: impl Into<String>,
        jobj_key: impl Into<String>,
        primary_key_name: impl Into<String>,
    ) -> Self {
        Self {
            prop_key: prop_key.into(),
            ids_key: ids_key.into(),
            jobj_key: jobj_key.into(),
            primary_key_name: primary_key_name.into(),
        }
    }

    /// Unfurl `body` into one row per identifier, in `ids` order
    pub fn unfurl<'a>(&'a self, body: &'a JsonValue) -> Result<Unfurled<'a>> {
        let root = body
            .as_object()
            .ok_or_else(|| Error::parse("columnar response is not an object"))?;

        let ids = match root.get(&self.ids_key) {
            Some(JsonValue::Array(ids)) => ids,
            Some(other) => {
                return Err(Error::parse(format!(
                    "'{}' is not an array: {other}",
                    self.ids_key
                )))
            }
            None => return Err(Error::parse(format!("missing '{}'", self.ids_key))),
        };

        // No entities: the other two keys may legitimately be absent
        if ids.is_empty() {
            return Ok(Unfurled {
                decoder: self,
                ids: ids.iter(),
                props: Vec::new(),
                values: None,
                base: JsonObject::new(),
            });
        }

        let props = match root.get(&self.prop_key) {
            Some(JsonValue::Object(props)) => props
                .iter()
                .map(|(name, index)| {
                    index
                        .as_u64()
                        .map(|i| (name.as_str(), i as usize))
                        .ok_or_else(|| {
                            Error::parse(format!(
                                "'{}.{name}' is not a position: {index}",
                                self.prop_key
                            ))
                        })
                })
                .collect::<Result<Vec<_>>>()?,
            _ => return Err(Error::parse(format!("missing object '{}'", self.prop_key))),
        };

        let values = match root.get(&self.jobj_key) {
            Some(JsonValue::Object(values)) => values,
            _ => return Err(Error::parse(format!("missing object '{}'", self.jobj_key))),
        };

        let base = root
            .iter()
            .filter(|(key, _)| {
                *key != &self.prop_key && *key != &self.ids_key && *key != &self.jobj_key
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(Unfurled {
            decoder: self,
            ids: ids.iter(),
            props,
            values: Some(values),
            base,
        })
    }

    fn build_row(
        &self,
        id: &JsonValue,
        props: &[(&str, usize)],
        values: &JsonObject,
        base: &JsonObject,
    ) -> Result<JsonObject> {
        let key = scalar_to_string(id)
            .ok_or_else(|| Error::parse(format!("'{}' entry is not a scalar: {id}", self.ids_key)))?;

        let row_values = match values.get(&key) {
            Some(JsonValue::Array(row_values)) => row_values,
            Some(other) => {
                return Err(Error::parse(format!(
                    "'{}.{key}' is not an array: {other}",
                    self.jobj_key
                )))
            }
            None => {
                return Err(Error::parse(format!(
                    "'{}' has no entry for id {key}",
                    self.jobj_key
                )))
            }
        };

        let mut record = JsonObject::new();
        for (name, index) in props {
            let value = row_values.get(*index).ok_or_else(|| {
                Error::parse(format!(
                    "position {index} of field '{name}' is out of range for id {key} ({} values)",
                    row_values.len()
                ))
            })?;
            record.insert((*name).to_string(), value.clone());
        }

        let mut row = base.clone();
        row.insert(self.primary_key_name.clone(), id.clone());
        row.insert(RECORD_KEY.to_string(), JsonValue::Object(record));
        Ok(row)
    }
}

impl RecordDecoder for UnfurlDecoder {
    fn decode<'a>(&'a self, body: &'a JsonValue) -> Result<Rows<'a>> {
        Ok(Box::new(self.unfurl(body)?))
    }
}

/// Iterator over unfurled rows
pub struct Unfurled<'a> {
    decoder: &'a UnfurlDecoder,
    ids: std::slice::Iter<'a, JsonValue>,
    props: Vec<(&'a str, usize)>,
    values: Option<&'a JsonObject>,
    base: JsonObject,
}

impl Iterator for Unfurled<'_> {
    type Item = Result<JsonObject>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.ids.next()?;
        let values = self.values?;
        Some(self.decoder.build_row(id, &self.props, values, &self.base))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ids.size_hint()
    }
}

/// Create a decoder from a stream's reshape config
pub fn create_decoder(config: &ReshapeConfig) -> Box<dyn RecordDecoder> {
    match config {
        ReshapeConfig::Passthrough { records_path } => Box::new(PassthroughDecoder {
            records_path: records_path.clone(),
        }),
        ReshapeConfig::Unfurl {
            prop_key,
            ids_key,
            jobj_key,
            primary_key_name,
        } => Box::new(UnfurlDecoder::new(
            prop_key.clone(),
            ids_key.clone(),
            jobj_key.clone(),
            primary_key_name.clone(),
        )),
    }
}

