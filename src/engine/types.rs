//! Engine types
//!
//! Emitted records, executor tuning and the run report.

use crate::config::TapConfig;
use crate::error::{Error, Result};
use crate::template::Context;
use crate::types::JsonObject;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;

// ============================================================================
// Record
// ============================================================================

/// One emitted row, tagged with its stream
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Declared stream name
    pub stream: String,
    /// Flat row produced by the stream's decoder
    pub data: JsonObject,
    /// Context of the stream instance that produced the row
    pub context: Context,
    /// When the row was handed to the sink
    pub emitted_at: DateTime<Utc>,
}

impl Record {
    pub fn new(stream: impl Into<String>, data: JsonObject, context: Context) -> Self {
        Self {
            stream: stream.into(),
            data,
            context,
            emitted_at: Utc::now(),
        }
    }
}

// ============================================================================
// Executor Config
// ============================================================================

/// Traversal tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Upper bound on pages per stream instance
    pub max_pages: u32,
    /// Default page size for index-range streams
    pub page_size: u32,
    /// Stream instances paginating at once, across the whole graph
    pub max_concurrency: usize,
    /// Lower bound for replication values when no bookmark exists
    pub start_date: Option<DateTime<Utc>>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_pages: 10_000,
            page_size: 100,
            max_concurrency: 1,
            start_date: None,
        }
    }
}

impl ExecutorConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the traversal settings from a tap configuration
    pub fn from_tap_config(config: &TapConfig) -> Result<Self> {
        Ok(Self {
            max_pages: config.max_pages,
            page_size: config.page_size,
            max_concurrency: config.max_concurrency,
            start_date: config.start_date()?,
        })
    }

    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set concurrency (values below 1 are treated as 1)
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    #[must_use]
    pub fn with_start_date(mut self, start_date: DateTime<Utc>) -> Self {
        self.start_date = Some(start_date);
        self
    }
}

// ============================================================================
// Run Report
// ============================================================================

/// Counters for one stream across all of its instances
#[derive(Debug, Default)]
pub struct StreamOutcome {
    /// Records handed to the sink
    pub records: usize,
    /// Pages fetched
    pub pages: usize,
    /// Stream instances started (one per context)
    pub instances: usize,
    /// Stream instances that ended in an error
    pub failed_instances: usize,
    /// Message of the first error seen for this stream
    pub first_error: Option<String>,
}

impl StreamOutcome {
    pub fn is_success(&self) -> bool {
        self.failed_instances == 0
    }
}

/// Counters gathered while one stream instance runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstanceStats {
    pub records: usize,
    pub pages: usize,
    pub skipped: usize,
}

/// Outcome of a whole extraction run
#[derive(Debug, Default)]
pub struct RunReport {
    /// Per-stream outcome, for every stream the run traversed
    pub streams: BTreeMap<String, StreamOutcome>,
    /// The error that stopped the run, if any
    pub aborted: Option<Error>,
    /// Wall time of the run
    pub duration: Duration,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the run was not aborted and no stream instance failed
    pub fn is_success(&self) -> bool {
        self.aborted.is_none() && self.streams.values().all(StreamOutcome::is_success)
    }

    pub fn outcome(&self, stream: &str) -> Option<&StreamOutcome> {
        self.streams.get(stream)
    }

    /// Streams with at least one failed instance
    pub fn failed_streams(&self) -> impl Iterator<Item = (&str, &StreamOutcome)> {
        self.streams
            .iter()
            .filter(|(_, outcome)| !outcome.is_success())
            .map(|(name, outcome)| (name.as_str(), outcome))
    }

    pub fn total_records(&self) -> usize {
        self.streams.values().map(|o| o.records).sum()
    }

    /// Fold one finished stream instance into the report
    pub fn record_instance(&mut self, stream: &str, stats: InstanceStats, error: Option<&Error>) {
        let outcome = self.streams.entry(stream.to_string()).or_default();
        outcome.instances += 1;
        outcome.records += stats.records;
        outcome.pages += stats.pages;
        if let Some(error) = error {
            outcome.failed_instances += 1;
            if outcome.first_error.is_none() {
                outcome.first_error = Some(error.to_string());
            }
        }
    }

    /// Remember the run-aborting error; the first one wins
    pub fn abort(&mut self, error: Error) {
        if self.aborted.is_none() {
            self.aborted = Some(error);
        }
    }
}
