// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # Zoho Sprints Tap
//!
//! Incremental extraction connector for the Zoho Sprints REST API.
//!
//! The tap walks the API's hierarchy (teams → projects → epics/sprints →
//! items → item details), paginates every endpoint, reshapes columnar
//! responses into flat records and hands them to a sink, under one global
//! rate limit and one shared OAuth token.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use zoho_sprints_tap::catalog::builtin_catalog;
//! use zoho_sprints_tap::cli::build_client;
//! use zoho_sprints_tap::config::TapConfig;
//! use zoho_sprints_tap::engine::{Executor, ExecutorConfig, MemorySink};
//!
//! #[tokio::main]
//! async fn main() -> zoho_sprints_tap::Result<()> {
//!     let config = TapConfig::from_file("config.json")?;
//!     let catalog = Arc::new(builtin_catalog()?);
//!     let selection = catalog.select(&["sprints"])?;
//!     let sink = Arc::new(MemorySink::new());
//!
//!     let report = Executor::new(Arc::new(build_client(&config)?), catalog, sink.clone())
//!         .with_config(ExecutorConfig::from_tap_config(&config)?)
//!         .with_selection(selection)
//!         .run()
//!         .await;
//!
//!     println!("{} records", report.total_records());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                Executor (stream graph traversal)                │
//! │      roots → paginate → reshape → emit → derive child context   │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────┬───────────┬───────┴───────┬───────────┬─────────────┐
//! │   Auth   │   HTTP    │   Paginate    │  Decode   │    State    │
//! ├──────────┼───────────┼───────────────┼───────────┼─────────────┤
//! │ OAuth2   │ Retry     │ Index/range   │ Unfurl    │ Bookmarks   │
//! │ refresh, │ Rate limit│ Page param    │ Passthru  │ per context │
//! │ single   │ Lockout   │ Page bound    │           │             │
//! │ flight   │ classify  │               │           │             │
//! └──────────┴───────────┴───────────────┴───────────┴─────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the tap
pub mod error;

/// Common types and type aliases
pub mod types;

/// OAuth refresh-token authority
pub mod auth;

/// HTTP client with retry, classification and rate limiting
pub mod http;

/// Pagination strategies
pub mod pagination;

/// Response reshaping (unfurl, passthrough)
pub mod decode;

/// Bookmark state and checkpointing
pub mod state;

/// Stream graph executor and sinks
pub mod engine;

/// Tap configuration
pub mod config;

/// Stream catalog (YAML)
pub mod catalog;

/// Template interpolation
pub mod template;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

pub use catalog::{builtin_catalog, load_catalog, Catalog, StreamDefinition};
pub use config::TapConfig;
pub use engine::{Executor, RunReport};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
