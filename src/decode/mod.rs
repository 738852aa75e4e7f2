//! Response decoder module
//!
//! Supports: passthrough rows and columnar (`prop`/`ids`/`jObj`) unfurling
//!
//! # Overview
//!
//! Several endpoints encode a list of entities as three parallel structures:
//! an identifier array, a field-name → position mapping and an identifier →
//! values mapping. [`UnfurlDecoder`] turns that into one row per identifier.
//! Everything else goes through [`PassthroughDecoder`].

mod decoders;
mod types;

pub use decoders::{create_decoder, PassthroughDecoder, UnfurlDecoder, Unfurled, RECORD_KEY};
pub use types::{RecordDecoder, ReshapeConfig, Rows};

#[cfg(test)]
mod tests;
