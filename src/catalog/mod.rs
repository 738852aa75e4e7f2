//! Stream catalog
//!
//! The static table of [`StreamDefinition`]s: data, not behavior. Each entry
//! names a path template, its parent, how it paginates, how its body is
//! reshaped and which record fields become context for its children.

mod parser;
mod types;

pub use parser::{builtin_catalog, load_catalog, load_catalog_from_str, validate_catalog, BUILTIN_CATALOG};
pub use types::{Catalog, Selection, StreamDefinition};
