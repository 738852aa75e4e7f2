//! CLI runner - executes commands

use crate::auth::TokenAuthority;
use crate::catalog::{load_catalog, Catalog};
use crate::cli::commands::{parse_stream_list, Cli, Commands, OutputFormat};
use crate::config::TapConfig;
use crate::engine::{Executor, ExecutorConfig, JsonLinesSink, RunReport, Sink};
use crate::error::{Error, Result};
use crate::http::{HttpClient, RateGovernor};
use crate::state::StateManager;
use reqwest::Client;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufWriter;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// CLI runner
pub struct Runner {
    cli: Cli,
    cancel: CancellationToken,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            cancel: CancellationToken::new(),
        }
    }

    /// Cancel in-flight work when `cancel` fires
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Check => self.check().await,
            Commands::Discover => self.discover(),
            Commands::Streams => self.streams(),
            Commands::Read {
                streams,
                output,
                state_out,
            } => {
                let streams = parse_stream_list(streams.as_deref());
                self.read(&streams, output.as_deref(), state_out.as_deref())
                    .await
            }
        }
    }

    fn load_config(&self) -> Result<TapConfig> {
        TapConfig::load(self.cli.config.as_deref(), self.cli.config_json.as_deref())
    }

    fn load_catalog(&self) -> Result<Catalog> {
        load_catalog(self.cli.catalog.as_deref())
    }

    fn load_state(&self) -> Result<StateManager> {
        // Inline state takes precedence
        if let Some(state_json) = &self.cli.state_json {
            StateManager::from_json(state_json)
        } else if let Some(path) = &self.cli.state {
            StateManager::from_file(path)
        } else {
            Ok(StateManager::in_memory())
        }
    }

    /// Check credentials by performing one token refresh
    async fn check(&self) -> Result<()> {
        let config = self.load_config()?;
        let authority = build_authority(&config)?;

        match authority.get_token_or_cancel(&self.cancel).await {
            Ok(_) => {
                self.output_message(&json!({
                    "type": "CONNECTION_STATUS",
                    "connectionStatus": {
                        "status": "SUCCEEDED",
                        "message": "Access token obtained"
                    }
                }));
            }
            Err(e) => {
                self.output_message(&json!({
                    "type": "CONNECTION_STATUS",
                    "connectionStatus": {
                        "status": "FAILED",
                        "message": format!("Connection failed: {e}")
                    }
                }));
            }
        }

        Ok(())
    }

    /// Print the catalog; fails when the configuration is incomplete
    fn discover(&self) -> Result<()> {
        self.load_config()?;
        let catalog = self.load_catalog()?;

        self.output_message(&json!({
            "type": "CATALOG",
            "catalog": serde_json::to_value(&catalog)?
        }));
        Ok(())
    }

    /// List stream names with their parents
    fn streams(&self) -> Result<()> {
        let catalog = self.load_catalog()?;

        let streams: Vec<Value> = catalog
            .streams
            .iter()
            .map(|s| json!({"name": s.name, "parent": s.parent}))
            .collect();

        self.output_message(&json!({
            "type": "STREAMS",
            "catalog": catalog.name,
            "streams": streams
        }));
        Ok(())
    }

    /// Extract the selected streams
    async fn read(&self, streams: &[String], output: Option<&Path>, state_out: Option<&Path>) -> Result<()> {
        let config = self.load_config()?;
        let catalog = Arc::new(self.load_catalog()?);
        let selection = catalog.select(streams)?;
        let state = self.load_state()?;

        let sink: Arc<dyn Sink> = match output {
            Some(path) => {
                let file = tokio::fs::File::create(path).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create output file '{}': {e}",
                        path.display()
                    ))
                })?;
                Arc::new(JsonLinesSink::new(BufWriter::new(file)))
            }
            None => Arc::new(JsonLinesSink::stdout()),
        };

        let executor = Executor::new(Arc::new(build_client(&config)?), catalog, sink)
            .with_config(ExecutorConfig::from_tap_config(&config)?)
            .with_selection(selection)
            .with_state(state.clone())
            .with_cancellation(self.cancel.clone());

        let report = executor.run().await;

        if let Some(path) = state_out {
            state.save_to_file(path).await?;
            info!("State written to {}", path.display());
        }

        summarize(&report);
        into_result(report)
    }

    /// Output a message
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

/// Build the token authority from a configuration
///
/// Refresh requests use the configured timeout and retry budget.
pub fn build_authority(config: &TapConfig) -> Result<TokenAuthority> {
    let http_client = Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(TokenAuthority::with_client(config.credentials(), http_client)
        .with_retry(config.refresh_retry()))
}

/// Build the API client from a configuration
///
/// One governor and one token authority are shared by every branch of a run.
pub fn build_client(config: &TapConfig) -> Result<HttpClient> {
    let governor = Arc::new(RateGovernor::new(config.rate_limit));
    let authority = Arc::new(build_authority(config)?);
    HttpClient::new(config.http_config(), governor, authority)
}

fn summarize(report: &RunReport) {
    for (name, outcome) in &report.streams {
        info!(
            "{name}: {} records, {} pages, {}/{} instances ok",
            outcome.records,
            outcome.pages,
            outcome.instances - outcome.failed_instances,
            outcome.instances
        );
        if let Some(first) = &outcome.first_error {
            error!("{name}: first error: {first}");
        }
    }
}

/// Turn a run report into the process result
fn into_result(report: RunReport) -> Result<()> {
    let failed: Vec<String> = report
        .failed_streams()
        .map(|(name, _)| name.to_string())
        .collect();
    if let Some(aborted) = report.aborted {
        return Err(aborted);
    }
    if !failed.is_empty() {
        return Err(Error::Other(format!(
            "{} stream(s) failed: {}",
            failed.len(),
            failed.join(", ")
        )));
    }
    Ok(())
}
