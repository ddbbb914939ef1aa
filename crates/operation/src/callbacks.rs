//! Collaborators supplied by the node agent

use async_trait::async_trait;

use uniter_core::action::{ActionDescriptor, ActionStatus};

use crate::error::CallbackError;

/// Side effects the operations need outside their own state
#[async_trait]
pub trait Callbacks: Send + Sync {
    /// Record an action as failed with the given message
    async fn fail_action(&self, action_id: &str, message: &str) -> Result<(), CallbackError>;

    /// Emit the "executing" notice for the unit of work about to run
    fn set_executing(&self, message: &str);

    /// Current status of an action as reported by the orchestrator
    async fn action_status(&self, action_id: &str) -> Result<ActionStatus, CallbackError>;
}

/// Source of action definitions
#[async_trait]
pub trait ActionGetter: Send + Sync {
    /// Fetch the definition for an action id.
    ///
    /// `Ok(None)` means the source answered but had no usable definition.
    async fn action(&self, action_id: &str) -> Result<Option<ActionDescriptor>, CallbackError>;
}
