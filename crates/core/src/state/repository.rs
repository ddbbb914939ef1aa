//! State store trait
//!
//! Defines the interface the executor uses to persist progress.

use async_trait::async_trait;

use super::model::State;
use crate::Result;

/// Storage for the single operation state record
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read the last persisted state, or the initial state if none was written
    async fn read(&self) -> Result<State>;

    /// Replace the persisted state
    async fn write(&self, state: &State) -> Result<()>;
}
