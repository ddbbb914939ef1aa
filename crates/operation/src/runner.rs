//! Runner contracts
//!
//! A runner executes exactly one hook or action. Operations never look
//! inside it; they only create it, prepare it and wait for it.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use uniter_core::hook::HookInfo;

use crate::error::RunnerError;

/// Data about the action a runner was built for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionData {
    /// Display name of the action
    pub name: String,
}

impl ActionData {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Executes one unit of work
#[async_trait]
pub trait Runner: Send + Sync {
    /// Set up the execution context (environment, credentials, ...)
    async fn prepare(&self) -> Result<(), RunnerError>;

    /// Run the named action.
    ///
    /// Blocks until the action completes or the cancellation token handed to
    /// the factory fires; a cancelled run returns [`RunnerError::Aborted`].
    async fn run_action(&self, name: &str) -> Result<(), RunnerError>;

    /// Run the named hook
    async fn run_hook(&self, name: &str) -> Result<(), RunnerError>;

    /// Action the runner was created for, if any
    fn action_data(&self) -> Option<ActionData>;
}

/// Creates runners bound to a unit of work
#[async_trait]
pub trait RunnerFactory: Send + Sync {
    /// Create a runner for an action.
    ///
    /// Fails with [`RunnerError::BadAction`] when the definition is malformed
    /// and [`RunnerError::ActionNotAvailable`] when the action is gone.
    async fn new_action_runner(
        &self,
        action_id: &str,
        cancel: CancellationToken,
    ) -> Result<Box<dyn Runner>, RunnerError>;

    /// Create a runner for a hook
    async fn new_hook_runner(
        &self,
        hook: &HookInfo,
        cancel: CancellationToken,
    ) -> Result<Box<dyn Runner>, RunnerError>;
}
