//! Agent main loop
//!
//! Polls the action queue, runs pending actions and any hooks they leave
//! queued, and feeds queue changes to the running operation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use uniter_core::hook::{HookInfo, HookKind};
use uniter_core::remote::Snapshot;
use uniter_core::state::{FileStateStore, Kind};
use uniter_operation::{CancellationToken, Executor, Factory, MachineLock, Operation};

use crate::actions::FileActionStore;
use crate::callbacks::AgentCallbacks;
use crate::config::AgentConfig;
use crate::process::ProcessRunnerFactory;

const UPDATE_CHANNEL_CAPACITY: usize = 64;

pub struct Agent {
    actions: Arc<FileActionStore>,
    factory: Factory,
    executor: Executor,
    updates: mpsc::Receiver<Snapshot>,
    poll_interval: Duration,
    shutdown: CancellationToken,
}

impl Agent {
    /// Build the agent and start polling the action queue
    pub async fn new(
        config: &AgentConfig,
        lock: MachineLock,
        shutdown: CancellationToken,
    ) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&config.data_dir).await?;

        let store = Arc::new(FileStateStore::new(config.state_path()));
        let actions = Arc::new(FileActionStore::new(config.actions_path()));
        let runner_factory = Arc::new(ProcessRunnerFactory::new(
            &config.charm_dir,
            Arc::clone(&actions),
        ));
        let callbacks = Arc::new(AgentCallbacks::new(Arc::clone(&actions)));
        let factory = Factory::new(actions.clone(), runner_factory, callbacks)
            .with_shutdown(shutdown.clone());
        let executor = Executor::new(store, lock).await?;

        let (tx, updates) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        tokio::spawn(poll_queue(
            Arc::clone(&actions),
            tx,
            config.poll_interval,
            shutdown.clone(),
        ));

        Ok(Self {
            actions,
            factory,
            executor,
            updates,
            poll_interval: config.poll_interval,
            shutdown,
        })
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        self.start_up().await?;

        let mut interval = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = interval.tick() => self.tick().await,
            }
        }

        info!("Agent stopped in state {}", self.executor.state());
        Ok(())
    }

    /// Finish whatever was interrupted, then install on first run
    async fn start_up(&mut self) -> anyhow::Result<()> {
        if let Some(op) = self.factory.resume(self.executor.state()).await? {
            info!("Resuming {}", op);
            self.run_op(op).await;
        }
        self.run_queued_hooks().await;

        let state = self.executor.state();
        if !state.started && state.kind == Kind::Continue {
            let op = self.factory.new_run_hook(HookInfo::new(HookKind::Install));
            self.run_op(op).await;
        }
        Ok(())
    }

    async fn tick(&mut self) {
        // Anything queued so far is already visible in the queue file
        while self.updates.try_recv().is_ok() {}

        match self.actions.settle_aborting().await {
            Ok(settled) if !settled.is_empty() => info!("Aborted idle actions {:?}", settled),
            Ok(_) => {}
            Err(e) => warn!("Failed to settle aborting actions: {}", e),
        }
        self.run_queued_hooks().await;

        let pending = match self.actions.pending().await {
            Ok(pending) => pending,
            Err(e) => {
                warn!("Failed to read action queue: {}", e);
                return;
            }
        };
        for action_id in pending {
            if self.shutdown.is_cancelled() {
                return;
            }
            match self.factory.new_action(&action_id).await {
                Ok(op) => self.run_op(op).await,
                Err(e) => error!("Cannot start action {}: {}", action_id, e),
            }
            self.run_queued_hooks().await;
        }
    }

    /// Run the hook the state carries until the state settles.
    ///
    /// The hook is run whatever the state's kind, so a hook carried by an
    /// action that never committed is not stranded.
    async fn run_queued_hooks(&mut self) {
        while !self.shutdown.is_cancelled() {
            let state = self.executor.state();
            let op = match (state.kind, &state.hook) {
                (Kind::RunHook, _) => match self.factory.resume(state).await {
                    Ok(Some(op)) => op,
                    Ok(None) => return,
                    Err(e) => {
                        error!("Cannot resume queued hook: {}", e);
                        return;
                    }
                },
                (_, Some(hook)) => self.factory.new_run_hook(hook.clone()),
                (_, None) => return,
            };
            let before = self.executor.state().clone();
            self.run_op(op).await;
            if self.executor.state() == &before {
                // Retried on the next tick
                return;
            }
        }
    }

    async fn run_op(&mut self, op: Operation) {
        let name = op.to_string();
        match self.executor.run(op, &mut self.updates).await {
            Ok(()) => debug!("Finished {}", name),
            Err(e) => error!("Operation {} failed: {}", name, e),
        }
    }
}

/// Send every queue change to the agent until shutdown
async fn poll_queue(
    actions: Arc<FileActionStore>,
    tx: mpsc::Sender<Snapshot>,
    poll_interval: Duration,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(poll_interval);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {}
        }

        let snapshot = match actions.refresh().await {
            Ok(snapshot) if snapshot.is_empty() => continue,
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Failed to refresh action queue: {}", e);
                continue;
            }
        };
        tokio::select! {
            _ = shutdown.cancelled() => break,
            sent = tx.send(snapshot) => if sent.is_err() {
                break;
            },
        }
    }
    debug!("Action queue poller stopped");
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    use tempfile::TempDir;
    use uniter_core::action::ActionStatus;
    use uniter_core::state::{State, StateStore, Step};

    use super::*;

    fn config(temp: &TempDir) -> AgentConfig {
        AgentConfig {
            data_dir: temp.path().join("data"),
            charm_dir: temp.path().join("charm"),
            poll_interval: Duration::from_millis(20),
            units_manager: false,
        }
    }

    fn script(charm_dir: &Path, dir: &str, name: &str, body: &str) {
        let dir = charm_dir.join(dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[tokio::test]
    async fn test_first_run_installs() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp);
        let marker = temp.path().join("installed");
        script(
            &config.charm_dir,
            "hooks",
            "install",
            &format!("touch {}", marker.display()),
        );

        let shutdown = CancellationToken::new();
        let mut agent = Agent::new(&config, MachineLock::new(), shutdown.clone())
            .await
            .unwrap();
        agent.start_up().await.unwrap();
        shutdown.cancel();

        assert!(marker.exists());
        let state = FileStateStore::new(config.state_path()).read().await.unwrap();
        assert_eq!(state, State::new(Kind::Continue, Step::Pending).with_started(true));
    }

    #[tokio::test]
    async fn test_tick_runs_pending_actions() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp);
        script(&config.charm_dir, "actions", "backup", "exit 0");

        let shutdown = CancellationToken::new();
        let mut agent = Agent::new(&config, MachineLock::new(), shutdown.clone())
            .await
            .unwrap();
        agent.start_up().await.unwrap();

        let good = agent.actions.enqueue("backup", false).await.unwrap();
        let bad = agent.actions.enqueue("restore", true).await.unwrap();
        agent.tick().await;
        shutdown.cancel();

        let good = agent.actions.get(&good.id).await.unwrap().unwrap();
        assert_eq!(good.status, ActionStatus::Completed);
        let bad = agent.actions.get(&bad.id).await.unwrap().unwrap();
        assert_eq!(bad.status, ActionStatus::Failed);
        assert!(bad
            .message
            .unwrap_or_default()
            .starts_with("cannot run \"restore\" action:"));
        assert_eq!(agent.executor.state().kind, Kind::Continue);
    }

    #[tokio::test]
    async fn test_hook_carried_by_vanished_action_still_runs() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp);
        let marker = temp.path().join("configured");
        script(
            &config.charm_dir,
            "hooks",
            "config-changed",
            &format!("touch {}", marker.display()),
        );
        FileStateStore::new(config.state_path())
            .write(
                &State::new(Kind::RunAction, Step::Pending)
                    .with_action_id("gone")
                    .with_hook(HookKind::ConfigChanged)
                    .with_started(true),
            )
            .await
            .unwrap();

        let shutdown = CancellationToken::new();
        let mut agent = Agent::new(&config, MachineLock::new(), shutdown.clone())
            .await
            .unwrap();
        agent.start_up().await.unwrap();
        shutdown.cancel();

        assert!(marker.exists());
        assert_eq!(
            agent.executor.state(),
            &State::new(Kind::Continue, Step::Pending).with_started(true)
        );
    }

    #[tokio::test]
    async fn test_tick_aborts_idle_aborting_actions() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp);
        script(&config.charm_dir, "actions", "backup", "exit 0");

        let shutdown = CancellationToken::new();
        let mut agent = Agent::new(&config, MachineLock::new(), shutdown.clone())
            .await
            .unwrap();
        agent.start_up().await.unwrap();

        let record = agent.actions.enqueue("backup", false).await.unwrap();
        agent
            .actions
            .set_status(&record.id, ActionStatus::Aborting, None)
            .await
            .unwrap();
        agent.tick().await;
        shutdown.cancel();

        let stored = agent.actions.get(&record.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ActionStatus::Aborted);
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_queued_hook_runs_after_interrupted_action() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp);
        let store = FileStateStore::new(config.state_path());
        store
            .write(
                &State::new(Kind::RunHook, Step::Pending)
                    .with_hook(HookKind::ConfigChanged)
                    .with_started(true),
            )
            .await
            .unwrap();

        let shutdown = CancellationToken::new();
        let mut agent = Agent::new(&config, MachineLock::new(), shutdown.clone())
            .await
            .unwrap();
        agent.start_up().await.unwrap();
        shutdown.cancel();

        assert_eq!(
            agent.executor.state(),
            &State::new(Kind::Continue, Step::Pending).with_started(true)
        );
    }
}
