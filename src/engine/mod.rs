//! Execution engine module
//!
//! Stream graph traversal and record delivery.
//!
//! # Overview
//!
//! The engine module provides:
//! - `Executor` - walks the catalog from its roots, paginating each stream
//!   instance and recursing into children with the derived context
//! - `Sink` - downstream consumer of records and state checkpoints
//! - `RunReport` - per-stream outcome of a run
//!
//! Failures stay local to the branch that produced them, except auth
//! failures, lockout and cancellation, which stop the whole run.

mod executor;
mod sink;
mod types;

pub use executor::Executor;
pub use sink::{JsonLinesSink, MemorySink, Sink};
pub use types::{ExecutorConfig, InstanceStats, Record, RunReport, StreamOutcome};
