//! The unit-of-work interface shared by every operation kind

use std::fmt;

use uniter_core::remote::Snapshot;
use uniter_core::state::{Kind, State};

use crate::error::Result;
use crate::run_action::RunAction;
use crate::run_hook::RunHook;

/// A single unit of work driven through prepare, execute and commit.
///
/// Each phase takes the last persisted state and returns the next one.
/// Phases of one operation never overlap, but `remote_state_changed` may be
/// called at any time, including while `execute` is waiting.
pub enum Operation {
    RunAction(RunAction),
    RunHook(RunHook),
}

impl Operation {
    /// State kind this operation produces while in flight
    pub fn kind(&self) -> Kind {
        match self {
            Self::RunAction(_) => Kind::RunAction,
            Self::RunHook(_) => Kind::RunHook,
        }
    }

    pub async fn prepare(&self, state: &State) -> Result<State> {
        match self {
            Self::RunAction(op) => op.prepare(state).await,
            Self::RunHook(op) => op.prepare(state).await,
        }
    }

    pub async fn execute(&self, state: &State) -> Result<State> {
        match self {
            Self::RunAction(op) => op.execute(state).await,
            Self::RunHook(op) => op.execute(state).await,
        }
    }

    pub async fn commit(&self, state: &State) -> Result<State> {
        match self {
            Self::RunAction(op) => op.commit(state),
            Self::RunHook(op) => op.commit(state),
        }
    }

    /// Whether the executor must hold the machine lock while this runs
    pub fn needs_global_machine_lock(&self) -> bool {
        match self {
            Self::RunAction(op) => op.needs_global_machine_lock(),
            Self::RunHook(_) => true,
        }
    }

    /// Feed a remote snapshot to the operation
    pub async fn remote_state_changed(&self, snapshot: &Snapshot) {
        match self {
            Self::RunAction(op) => op.remote_state_changed(snapshot).await,
            Self::RunHook(_) => {}
        }
    }

    /// Check whether a persisted state was written by this same unit of work
    pub fn owns(&self, state: &State) -> bool {
        if state.kind != self.kind() {
            return false;
        }
        match self {
            Self::RunAction(op) => state.action_id.as_deref() == Some(op.action_id()),
            Self::RunHook(op) => state.hook.as_ref() == Some(op.hook()),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RunAction(op) => op.fmt(f),
            Self::RunHook(op) => op.fmt(f),
        }
    }
}
