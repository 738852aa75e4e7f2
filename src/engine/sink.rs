//! Record sinks
//!
//! The executor hands every emitted record and every state checkpoint to a
//! [`Sink`]. Within one stream, records arrive in emission order.

use super::types::Record;
use crate::error::{Error, Result};
use crate::state::State;
use async_trait::async_trait;
use serde_json::json;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Downstream consumer of records and state
#[async_trait]
pub trait Sink: Send + Sync {
    /// Accept one record
    async fn record(&self, record: Record) -> Result<()>;

    /// Accept a state checkpoint
    async fn state(&self, state: &State) -> Result<()>;

    /// Flush buffered output
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Memory Sink
// ============================================================================

/// Collects everything in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<Record>>,
    states: Mutex<Vec<State>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records, in arrival order
    pub async fn records(&self) -> Vec<Record> {
        self.records.lock().await.clone()
    }

    /// Records of one stream, in arrival order
    pub async fn records_for(&self, stream: &str) -> Vec<Record> {
        self.records
            .lock()
            .await
            .iter()
            .filter(|r| r.stream == stream)
            .cloned()
            .collect()
    }

    /// All state checkpoints, in arrival order
    pub async fn states(&self) -> Vec<State> {
        self.states.lock().await.clone()
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn record(&self, record: Record) -> Result<()> {
        self.records.lock().await.push(record);
        Ok(())
    }

    async fn state(&self, state: &State) -> Result<()> {
        self.states.lock().await.push(state.clone());
        Ok(())
    }
}

// ============================================================================
// JSON Lines Sink
// ============================================================================

/// Writes Singer-style `RECORD` and `STATE` messages, one JSON object per line
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl JsonLinesSink<tokio::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    async fn write_line(&self, message: &serde_json::Value) -> Result<()> {
        let mut line = serde_json::to_vec(message)
            .map_err(|e| Error::Other(format!("Failed to serialize message: {e}")))?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        Ok(())
    }
}

#[async_trait]
impl<W> Sink for JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn record(&self, record: Record) -> Result<()> {
        self.write_line(&json!({
            "type": "RECORD",
            "stream": record.stream,
            "record": record.data,
            "time_extracted": record.emitted_at.to_rfc3339(),
        }))
        .await
    }

    async fn state(&self, state: &State) -> Result<()> {
        let value = serde_json::to_value(state)
            .map_err(|e| Error::state(format!("Failed to serialize state: {e}")))?;
        self.write_line(&json!({"type": "STATE", "value": value})).await?;
        self.flush().await
    }

    async fn flush(&self) -> Result<()> {
        self.writer.lock().await.flush().await?;
        Ok(())
    }
}

impl<W> std::fmt::Debug for JsonLinesSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLinesSink").finish_non_exhaustive()
    }
}
