//! File-based state storage implementation
//!
//! Stores the state record as JSON in a file on disk.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

use super::model::State;
use super::repository::StateStore;
use crate::Result;

/// File-based state store using JSON
pub struct FileStateStore {
    /// Path to the JSON file
    path: PathBuf,
    /// Last state read or written
    cache: RwLock<Option<State>>,
}

impl FileStateStore {
    /// Create a new FileStateStore
    ///
    /// If the file doesn't exist, it will be created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<State> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(State::default());
        }
        let content = tokio::fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn read(&self) -> Result<State> {
        if let Some(state) = self.cache.read().await.as_ref() {
            return Ok(state.clone());
        }
        let state = self.load().await?;
        *self.cache.write().await = Some(state.clone());
        Ok(state)
    }

    async fn write(&self, state: &State) -> Result<()> {
        let content = serde_json::to_string_pretty(state)?;

        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write beside the target and rename so a crash never leaves half a record
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        *self.cache.write().await = Some(state.clone());
        debug!("Wrote state {} to {}", state, self.path.display());
        Ok(())
    }
}
