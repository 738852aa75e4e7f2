//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Zoho Sprints incremental extraction tap
#[derive(Parser, Debug)]
#[command(name = "zoho-sprints-tap")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (JSON)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Inline configuration JSON (takes precedence over --config)
    #[arg(long, global = true)]
    pub config_json: Option<String>,

    /// Stream catalog file (YAML), replaces the built-in catalog
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// State file (JSON), read at start and checkpointed during the run
    #[arg(short, long, global = true)]
    pub state: Option<PathBuf>,

    /// Inline state JSON
    #[arg(long, global = true)]
    pub state_json: Option<String>,

    /// Output format for control messages
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the configuration and obtain an access token
    Check,

    /// Print the stream catalog
    Discover,

    /// List stream names and their parents
    Streams,

    /// Extract records from streams
    Read {
        /// Streams to extract (comma-separated, empty = all)
        #[arg(long)]
        streams: Option<String>,

        /// Write messages to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the final state to this file
        #[arg(long)]
        state_out: Option<PathBuf>,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}

/// Split a `--streams` value into names
pub fn parse_stream_list(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
