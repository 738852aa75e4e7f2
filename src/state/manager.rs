//! State manager implementation
//!
//! Provides file-based state persistence with atomic writes.

use super::types::State;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// State manager for persisting and loading state
///
/// Clones share the same state.
#[derive(Debug)]
pub struct StateManager {
    /// Path to the state file (empty in memory mode)
    path: PathBuf,
    /// Current state (cached)
    state: Arc<RwLock<State>>,
    /// Whether to save on every bookmark update
    auto_save: bool,
}

impl StateManager {
    /// Create a state manager that checkpoints into `path`
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            state: Arc::new(RwLock::new(State::new())),
            auto_save: true,
        }
    }

    /// Create an in-memory state manager (no file persistence)
    pub fn in_memory() -> Self {
        Self::with_state(State::new())
    }

    /// Create an in-memory state manager seeded with `state`
    pub fn with_state(state: State) -> Self {
        Self {
            path: PathBuf::new(),
            state: Arc::new(RwLock::new(state)),
            auto_save: false,
        }
    }

    /// Create a state manager from a file, loading existing state if present
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::state(format!("Failed to read state file: {e}")))?;
            parse_state(&contents)?
        } else {
            State::new()
        };

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(state)),
            auto_save: true,
        })
    }

    /// Create a state manager from inline JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::with_state(parse_state(json)?))
    }

    /// Save state to a specific file path
    ///
    /// Writes a sibling temp file and renames it over the target.
    pub async fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let contents = self.to_json_pretty().await?;

        let path = path.as_ref();
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::state(format!("Failed to write state file: {e}")))?;

        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|e| Error::state(format!("Failed to rename state file: {e}")))?;

        Ok(())
    }

    /// Save current state to the manager's own file
    pub async fn save(&self) -> Result<()> {
        if self.is_in_memory() {
            return Ok(());
        }
        self.save_to_file(&self.path).await
    }

    /// Snapshot of the current state
    pub async fn snapshot(&self) -> State {
        self.state.read().await.clone()
    }

    /// Export state as pretty-printed JSON string
    pub async fn to_json_pretty(&self) -> Result<String> {
        let state = self.state.read().await;
        serde_json::to_string_pretty(&*state)
            .map_err(|e| Error::state(format!("Failed to serialize state: {e}")))
    }

    /// Bookmark of one stream instance
    pub async fn get_bookmark(&self, stream: &str, partition: &str) -> Option<String> {
        let state = self.state.read().await;
        state.get_bookmark(stream, partition).map(ToString::to_string)
    }

    /// Move a bookmark forward, checkpointing if it changed
    pub async fn advance_bookmark(&self, stream: &str, partition: &str, value: &str) -> Result<bool> {
        let changed = {
            let mut state = self.state.write().await;
            state.advance_bookmark(stream, partition, value)
        };

        if changed && self.auto_save {
            self.save().await?;
        }

        Ok(changed)
    }

    /// Clear state for a specific stream
    pub async fn clear_stream(&self, stream: &str) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state.bookmarks.remove(stream);
        }

        if self.auto_save {
            self.save().await?;
        }

        Ok(())
    }

    /// Get the state file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if using in-memory mode
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str().is_empty()
    }
}

impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            state: Arc::clone(&self.state),
            auto_save: self.auto_save,
        }
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::in_memory()
    }
}

fn parse_state(contents: &str) -> Result<State> {
    if contents.trim().is_empty() {
        return Ok(State::new());
    }
    serde_json::from_str(contents).map_err(|e| Error::state(format!("Failed to parse state: {e}")))
}
