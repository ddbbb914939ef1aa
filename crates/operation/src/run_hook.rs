//! Run-hook operation

use std::fmt;
use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;
use tracing::info;

use uniter_core::hook::{HookInfo, HookKind};
use uniter_core::state::{Kind, State, Step};

use crate::callbacks::Callbacks;
use crate::error::{OperationError, Result};
use crate::runner::{Runner, RunnerFactory};

/// Runs one queued lifecycle hook
pub struct RunHook {
    info: HookInfo,
    runner_factory: Arc<dyn RunnerFactory>,
    callbacks: Arc<dyn Callbacks>,
    runner: OnceLock<Box<dyn Runner>>,
    cancel: CancellationToken,
}

impl RunHook {
    pub(crate) fn new(
        info: HookInfo,
        runner_factory: Arc<dyn RunnerFactory>,
        callbacks: Arc<dyn Callbacks>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            info,
            runner_factory,
            callbacks,
            runner: OnceLock::new(),
            cancel,
        }
    }

    pub fn hook(&self) -> &HookInfo {
        &self.info
    }

    pub async fn prepare(&self, state: &State) -> Result<State> {
        let runner = self
            .runner_factory
            .new_hook_runner(&self.info, self.cancel.clone())
            .await
            .map_err(|source| OperationError::CreateRunner {
                target: format!("hook {:?}", self.info.kind.as_str()),
                source,
            })?;

        runner.prepare().await?;

        if self.runner.set(runner).is_err() {
            panic!("run {} hook prepared twice", self.info.kind);
        }

        Ok(State {
            kind: Kind::RunHook,
            step: Step::Pending,
            action_id: None,
            hook: Some(self.info.clone()),
            started: state.started,
            charm_url: state.charm_url.clone(),
        })
    }

    pub async fn execute(&self, state: &State) -> Result<State> {
        let Some(runner) = self.runner.get() else {
            panic!("run {} hook executed before prepare", self.info.kind);
        };

        let name = self.info.kind.as_str();
        self.callbacks.set_executing(&format!("running {} hook", name));

        runner
            .run_hook(name)
            .await
            .map_err(|source| OperationError::RunHook {
                hook: name.to_string(),
                source,
            })?;
        info!("Hook {} finished", name);

        Ok(State {
            step: Step::Done,
            ..state.clone()
        })
    }

    pub fn commit(&self, state: &State) -> Result<State> {
        let started = state.started || self.info.kind == HookKind::Install;
        Ok(State::new(Kind::Continue, Step::Pending)
            .with_started(started)
            .with_charm_url(state.charm_url.clone()))
    }
}

impl fmt::Display for RunHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run {} hook", self.info.kind)
    }
}
