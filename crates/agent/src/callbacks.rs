//! Node callbacks backed by the action queue

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use uniter_core::action::ActionStatus;
use uniter_operation::{CallbackError, Callbacks};

use crate::actions::FileActionStore;

pub struct AgentCallbacks {
    actions: Arc<FileActionStore>,
}

impl AgentCallbacks {
    pub fn new(actions: Arc<FileActionStore>) -> Self {
        Self { actions }
    }
}

#[async_trait]
impl Callbacks for AgentCallbacks {
    async fn fail_action(&self, action_id: &str, message: &str) -> Result<(), CallbackError> {
        self.actions
            .set_status(action_id, ActionStatus::Failed, Some(message.to_string()))
            .await
            .map_err(|e| CallbackError::new(e.to_string()))
    }

    fn set_executing(&self, message: &str) {
        info!("{}", message);
    }

    async fn action_status(&self, action_id: &str) -> Result<ActionStatus, CallbackError> {
        match self.actions.get(action_id).await {
            Ok(Some(record)) => Ok(record.status),
            Ok(None) => Err(CallbackError::new(format!("action {} not found", action_id))),
            Err(e) => Err(CallbackError::new(e.to_string())),
        }
    }
}
