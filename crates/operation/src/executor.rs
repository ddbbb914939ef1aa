//! Operation executor - drives operations and persists their progress

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use uniter_core::remote::Snapshot;
use uniter_core::state::{State, StateStore, Step};

use crate::error::{OperationError, Result};
use crate::lock::MachineLock;
use crate::operation::Operation;

/// Runs operations one at a time against the persisted state
pub struct Executor {
    store: Arc<dyn StateStore>,
    state: State,
    lock: MachineLock,
}

impl Executor {
    /// Create an executor starting from the last persisted state
    pub async fn new(store: Arc<dyn StateStore>, lock: MachineLock) -> Result<Self> {
        let state = store.read().await?;
        state.validate()?;
        info!("Executor starting from state {}", state);
        Ok(Self { store, state, lock })
    }

    /// Last state written
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Run one operation to completion.
    ///
    /// Snapshots arriving on `updates` while the operation executes are
    /// forwarded to it. A skipped operation leaves the state untouched.
    pub async fn run(
        &mut self,
        op: Operation,
        updates: &mut mpsc::Receiver<Snapshot>,
    ) -> Result<()> {
        let _guard = if op.needs_global_machine_lock() {
            Some(self.lock.acquire(op.to_string()).await)
        } else {
            None
        };
        info!("Running operation {}", op);

        if op.owns(&self.state) && self.state.step == Step::Done {
            info!("Operation {} already executed, committing", op);
        } else {
            let prepared = match op.prepare(&self.state).await {
                Err(OperationError::SkipExecute) => {
                    debug!("Skipped operation {}", op);
                    return Ok(());
                }
                result => result?,
            };
            self.advance(&op, prepared).await?;

            let executed = execute_with_updates(&op, &self.state, updates).await?;
            self.advance(&op, executed).await?;
        }

        let committed = op.commit(&self.state).await?;
        if let Err(e) = committed.validate() {
            panic!("{} committed an invalid state: {}", op, e);
        }
        self.write(committed).await?;
        info!("Completed operation {}", op);
        Ok(())
    }

    async fn advance(&mut self, op: &Operation, state: State) -> Result<()> {
        if state.kind != op.kind() {
            panic!("{} produced a {} state", op, state.kind);
        }
        if let Err(e) = state.validate() {
            panic!("{} produced an invalid state: {}", op, e);
        }
        self.write(state).await
    }

    async fn write(&mut self, state: State) -> Result<()> {
        self.store.write(&state).await?;
        debug!("State is now {}", state);
        self.state = state;
        Ok(())
    }
}

async fn execute_with_updates(
    op: &Operation,
    state: &State,
    updates: &mut mpsc::Receiver<Snapshot>,
) -> Result<State> {
    let execute = op.execute(state);
    tokio::pin!(execute);

    let mut open = true;
    loop {
        tokio::select! {
            result = &mut execute => return result,
            snapshot = updates.recv(), if open => match snapshot {
                Some(snapshot) => op.remote_state_changed(&snapshot).await,
                None => open = false,
            },
        }
    }
}
