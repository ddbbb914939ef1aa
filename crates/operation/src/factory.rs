//! Builds operations for requested units of work

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use uniter_core::hook::HookInfo;
use uniter_core::state::{Kind, State};

use crate::callbacks::{ActionGetter, Callbacks};
use crate::error::{OperationError, Result};
use crate::operation::Operation;
use crate::run_action::RunAction;
use crate::run_hook::RunHook;
use crate::runner::RunnerFactory;

/// Creates operations bound to a runner source and the node callbacks
pub struct Factory {
    action_getter: Arc<dyn ActionGetter>,
    runner_factory: Arc<dyn RunnerFactory>,
    callbacks: Arc<dyn Callbacks>,
    /// Parent of every operation's cancellation token
    shutdown: CancellationToken,
}

impl Factory {
    pub fn new(
        action_getter: Arc<dyn ActionGetter>,
        runner_factory: Arc<dyn RunnerFactory>,
        callbacks: Arc<dyn Callbacks>,
    ) -> Self {
        Self {
            action_getter,
            runner_factory,
            callbacks,
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancel in-flight units of work when this token fires
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Create an operation that runs the given action.
    ///
    /// Only a failed fetch is an error here; a missing definition surfaces
    /// when the runner is created.
    pub async fn new_action(&self, action_id: &str) -> Result<Operation> {
        let descriptor = self
            .action_getter
            .action(action_id)
            .await
            .map_err(|e| OperationError::FetchAction {
                action_id: action_id.to_string(),
                message: e.to_string(),
            })?;
        if descriptor.is_none() {
            debug!("No definition found for action {}", action_id);
        }

        Ok(Operation::RunAction(RunAction::new(
            action_id.to_string(),
            descriptor,
            Arc::clone(&self.runner_factory),
            Arc::clone(&self.callbacks),
            self.shutdown.child_token(),
        )))
    }

    /// Create an operation that runs the given hook
    pub fn new_run_hook(&self, hook: HookInfo) -> Operation {
        Operation::RunHook(RunHook::new(
            hook,
            Arc::clone(&self.runner_factory),
            Arc::clone(&self.callbacks),
            self.shutdown.child_token(),
        ))
    }

    /// Rebuild the operation a persisted state belongs to
    pub async fn resume(&self, state: &State) -> Result<Option<Operation>> {
        match (state.kind, &state.action_id, &state.hook) {
            (Kind::RunAction, Some(action_id), _) => self.new_action(action_id).await.map(Some),
            (Kind::RunHook, _, Some(hook)) => Ok(Some(self.new_run_hook(hook.clone()))),
            _ => Ok(None),
        }
    }
}
