//! CLI module
//!
//! Command-line interface for running the tap.
//!
//! # Commands
//!
//! - `check` - Validate configuration and obtain an access token
//! - `discover` - Print the stream catalog
//! - `streams` - List stream names and parents
//! - `read` - Extract records from streams

mod commands;
mod runner;

pub use commands::{parse_stream_list, Cli, Commands, OutputFormat};
pub use runner::{build_authority, build_client, Runner};
