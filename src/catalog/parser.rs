//! YAML parser for stream catalogs
//!
//! Parses and validates catalog files. The Zoho Sprints catalog is embedded
//! in the binary; `--catalog <file>` loads a replacement.

use super::types::{Catalog, StreamDefinition};
use crate::decode::ReshapeConfig;
use crate::error::{Error, Result};
use crate::template::extract_variables;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

/// Built-in catalog YAML
pub const BUILTIN_CATALOG: &str = include_str!("../../catalog/zoho_sprints.yaml");

/// Load the built-in catalog
pub fn builtin_catalog() -> Result<Catalog> {
    load_catalog_from_str(BUILTIN_CATALOG)
}

/// Load a catalog from a file, or the built-in one when no path is given
pub fn load_catalog(path: Option<&Path>) -> Result<Catalog> {
    let Some(path) = path else {
        return builtin_catalog();
    };

    let content = fs::read_to_string(path).map_err(|e| {
        Error::config(format!(
            "Failed to read catalog file '{}': {e}",
            path.display()
        ))
    })?;
    load_catalog_from_str(&content)
}

/// Load a catalog from a YAML string
pub fn load_catalog_from_str(yaml: &str) -> Result<Catalog> {
    let catalog: Catalog = serde_yaml::from_str(yaml)
        .map_err(|e| Error::config(format!("Failed to parse catalog YAML: {e}")))?;

    validate_catalog(&catalog)?;
    Ok(catalog)
}

/// Validate a catalog
pub fn validate_catalog(catalog: &Catalog) -> Result<()> {
    if catalog.streams.is_empty() {
        return Err(Error::config("Catalog must have at least one stream"));
    }

    let mut by_name: HashMap<&str, &StreamDefinition> = HashMap::new();
    for stream in &catalog.streams {
        validate_stream(stream)?;
        if by_name.insert(stream.name.as_str(), stream).is_some() {
            return Err(Error::config(format!(
                "Duplicate stream name '{}'",
                stream.name
            )));
        }
    }

    for stream in &catalog.streams {
        if let Some(parent) = &stream.parent {
            if !by_name.contains_key(parent.as_str()) {
                return Err(Error::config(format!(
                    "Stream '{}' has unknown parent '{parent}'",
                    stream.name
                )));
            }
        }
    }

    for stream in &catalog.streams {
        check_ancestry(stream, &by_name)?;
    }

    Ok(())
}

/// Validate a stream definition
fn validate_stream(stream: &StreamDefinition) -> Result<()> {
    if stream.name.is_empty() {
        return Err(Error::config("Stream name cannot be empty"));
    }

    if stream.path.is_empty() {
        return Err(Error::config(format!(
            "Stream '{}' path cannot be empty",
            stream.name
        )));
    }

    if let ReshapeConfig::Unfurl {
        prop_key,
        ids_key,
        jobj_key,
        primary_key_name,
    } = &stream.reshape
    {
        let keys = [
            ("prop_key", prop_key),
            ("ids_key", ids_key),
            ("jobj_key", jobj_key),
            ("primary_key_name", primary_key_name),
        ];
        for (field, value) in keys {
            if value.is_empty() {
                return Err(Error::config(format!(
                    "Stream '{}' unfurl {field} cannot be empty",
                    stream.name
                )));
            }
        }
    }

    Ok(())
}

/// Walk up from a stream: no cycles, and every path variable is bound by an ancestor
fn check_ancestry(stream: &StreamDefinition, by_name: &HashMap<&str, &StreamDefinition>) -> Result<()> {
    let mut seen = HashSet::from([stream.name.as_str()]);
    let mut bound: HashSet<&str> = HashSet::new();
    let mut current = stream.parent.as_deref();

    while let Some(name) = current {
        if !seen.insert(name) {
            return Err(Error::config(format!(
                "Stream '{}' is part of a parent cycle",
                stream.name
            )));
        }
        let Some(parent) = by_name.get(name) else {
            break;
        };
        bound.extend(parent.context.keys().map(String::as_str));
        current = parent.parent.as_deref();
    }

    let templated = std::iter::once(stream.path.as_str()).chain(stream.params.values().map(String::as_str));
    for template in templated {
        for variable in extract_variables(template) {
            if !bound.contains(variable.as_str()) {
                return Err(Error::config(format!(
                    "Stream '{}' uses '{{{{ {variable} }}}}' but no ancestor provides it",
                    stream.name
                )));
            }
        }
    }

    Ok(())
}
