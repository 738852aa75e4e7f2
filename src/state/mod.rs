//! State management module
//!
//! Handles bookmark tracking and checkpointing for incremental syncs.
//!
//! # Overview
//!
//! The state module provides:
//! - `State` - bookmarks per stream and per context partition
//! - `StateManager` - file-based state persistence with atomic saves
//! - Replication value ordering across epoch and RFC 3339 formats

mod manager;
mod types;

pub use manager::StateManager;
pub use types::{compare_replication, is_before_start, PartitionState, ReplicationValue, State, StreamState};
