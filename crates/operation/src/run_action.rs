//! Run-action operation

use std::fmt;
use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use uniter_core::action::ActionDescriptor;
use uniter_core::remote::Snapshot;
use uniter_core::state::{Kind, State, Step};

use crate::callbacks::Callbacks;
use crate::error::{OperationError, Result, RunnerError};
use crate::runner::{Runner, RunnerFactory};
use crate::watch::ActionWatcher;

/// Runs one operator-invoked action
pub struct RunAction {
    action_id: String,
    descriptor: Option<ActionDescriptor>,
    runner_factory: Arc<dyn RunnerFactory>,
    callbacks: Arc<dyn Callbacks>,
    /// Set once by `prepare`
    runner: OnceLock<Box<dyn Runner>>,
    watcher: ActionWatcher,
}

impl RunAction {
    pub(crate) fn new(
        action_id: String,
        descriptor: Option<ActionDescriptor>,
        runner_factory: Arc<dyn RunnerFactory>,
        callbacks: Arc<dyn Callbacks>,
        cancel: CancellationToken,
    ) -> Self {
        let watcher = ActionWatcher::new(action_id.clone(), cancel);
        Self {
            action_id,
            descriptor,
            runner_factory,
            callbacks,
            runner: OnceLock::new(),
            watcher,
        }
    }

    pub fn action_id(&self) -> &str {
        &self.action_id
    }

    /// Whether the action must hold the machine lock
    pub fn needs_global_machine_lock(&self) -> bool {
        !self.descriptor.as_ref().is_some_and(|d| d.parallel)
    }

    pub async fn prepare(&self, state: &State) -> Result<State> {
        let runner = match self
            .runner_factory
            .new_action_runner(&self.action_id, self.watcher.token())
            .await
        {
            Ok(runner) => runner,
            Err(err @ RunnerError::BadAction { .. }) => {
                warn!("Action {} is malformed: {}", self.action_id, err);
                // The failure now belongs to the action; a callback error wins over it
                self.callbacks
                    .fail_action(&self.action_id, &err.to_string())
                    .await?;
                return Err(OperationError::SkipExecute);
            }
            Err(RunnerError::ActionNotAvailable) => {
                debug!("Action {} is no longer available", self.action_id);
                return Err(OperationError::SkipExecute);
            }
            Err(source) => {
                return Err(OperationError::CreateRunner {
                    target: format!("action {:?}", self.action_id),
                    source,
                });
            }
        };

        runner.prepare().await?;

        if self.runner.set(runner).is_err() {
            panic!("run action {} prepared twice", self.action_id);
        }

        Ok(State {
            kind: Kind::RunAction,
            step: Step::Pending,
            action_id: Some(self.action_id.clone()),
            hook: state.hook.clone(),
            started: state.started,
            charm_url: String::new(),
        })
    }

    pub async fn execute(&self, state: &State) -> Result<State> {
        let Some(runner) = self.runner.get() else {
            panic!("run action {} executed before prepare", self.action_id);
        };

        let name = runner
            .action_data()
            .map(|data| data.name)
            .or_else(|| self.descriptor.as_ref().map(|d| d.name.clone()))
            .unwrap_or_else(|| self.action_id.clone());
        self.callbacks
            .set_executing(&format!("running action {}", name));

        runner
            .run_action(&name)
            .await
            .map_err(|source| OperationError::RunAction {
                action_id: self.action_id.clone(),
                source,
            })?;
        info!("Action {} ({}) finished", self.action_id, name);

        Ok(State {
            kind: Kind::RunAction,
            step: Step::Done,
            action_id: Some(self.action_id.clone()),
            hook: state.hook.clone(),
            started: state.started,
            charm_url: state.charm_url.clone(),
        })
    }

    /// Pick up a queued hook if there is one, otherwise go back to waiting
    pub fn commit(&self, state: &State) -> Result<State> {
        let next = match &state.hook {
            Some(hook) => State::new(Kind::RunHook, Step::Pending).with_hook(hook.clone()),
            None => State::new(Kind::Continue, Step::Pending),
        };
        Ok(next.with_started(state.started))
    }

    pub async fn remote_state_changed(&self, snapshot: &Snapshot) {
        self.watcher
            .remote_state_changed(snapshot, self.callbacks.as_ref())
            .await;
    }

    #[cfg(test)]
    pub(crate) fn watcher(&self) -> &ActionWatcher {
        &self.watcher
    }
}

impl fmt::Display for RunAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run action {}", self.action_id)
    }
}
