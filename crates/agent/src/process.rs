//! Process runner
//!
//! Runs `actions/<name>` and `hooks/<name>` executables from the workload
//! directory. Action results are written back to the action queue; a
//! cancelled action has its process killed.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use uniter_core::action::ActionStatus;
use uniter_core::hook::HookInfo;
use uniter_operation::{ActionData, CancellationToken, Runner, RunnerError, RunnerFactory};

use crate::actions::FileActionStore;

/// Builds process runners rooted at a workload directory
pub struct ProcessRunnerFactory {
    charm_dir: PathBuf,
    actions: Arc<FileActionStore>,
}

impl ProcessRunnerFactory {
    pub fn new(charm_dir: impl Into<PathBuf>, actions: Arc<FileActionStore>) -> Self {
        Self {
            charm_dir: charm_dir.into(),
            actions,
        }
    }
}

#[async_trait]
impl RunnerFactory for ProcessRunnerFactory {
    async fn new_action_runner(
        &self,
        action_id: &str,
        cancel: CancellationToken,
    ) -> Result<Box<dyn Runner>, RunnerError> {
        let record = self
            .actions
            .get(action_id)
            .await
            .map_err(|e| RunnerError::failed(e.to_string()))?
            .ok_or(RunnerError::ActionNotAvailable)?;
        match record.status {
            ActionStatus::Pending | ActionStatus::Running => {}
            ActionStatus::Aborting => {
                // Nothing will ever run it, so the abort is final
                if let Err(e) = self
                    .actions
                    .set_status(action_id, ActionStatus::Aborted, Some("aborted before it started".to_string()))
                    .await
                {
                    warn!("Failed to record abort of action {}: {}", action_id, e);
                }
                return Err(RunnerError::ActionNotAvailable);
            }
            _ => return Err(RunnerError::ActionNotAvailable),
        }

        if record.name.is_empty() || record.name.contains(['/', '\\']) {
            return Err(RunnerError::bad_action(record.name, "invalid action name"));
        }
        let path = self.charm_dir.join("actions").join(&record.name);
        if !tokio::fs::try_exists(&path).await? {
            return Err(RunnerError::bad_action(
                record.name,
                format!("no executable at {}", path.display()),
            ));
        }

        Ok(Box::new(ProcessRunner {
            charm_dir: self.charm_dir.clone(),
            executable: Some(path),
            action: Some((record.id, record.name)),
            actions: Arc::clone(&self.actions),
            cancel,
        }))
    }

    async fn new_hook_runner(
        &self,
        hook: &HookInfo,
        cancel: CancellationToken,
    ) -> Result<Box<dyn Runner>, RunnerError> {
        let path = self.charm_dir.join("hooks").join(hook.kind.as_str());
        // A workload does not have to implement every hook
        let executable = if tokio::fs::try_exists(&path).await? {
            Some(path)
        } else {
            debug!("No {} hook in {}", hook.kind, self.charm_dir.display());
            None
        };

        Ok(Box::new(ProcessRunner {
            charm_dir: self.charm_dir.clone(),
            executable,
            action: None,
            actions: Arc::clone(&self.actions),
            cancel,
        }))
    }
}

/// Runs one executable
struct ProcessRunner {
    charm_dir: PathBuf,
    executable: Option<PathBuf>,
    /// Action id and name, when running an action
    action: Option<(String, String)>,
    actions: Arc<FileActionStore>,
    cancel: CancellationToken,
}

impl ProcessRunner {
    fn spawn(&self, executable: &Path, env: &[(&str, &str)]) -> Result<Child, RunnerError> {
        let mut cmd = Command::new(executable);
        cmd.current_dir(&self.charm_dir)
            .env("CHARM_DIR", &self.charm_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn()?;
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(stdout, "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(stderr, "stderr"));
        }
        Ok(child)
    }

    /// Wait for the child unless the token fires first; `None` means killed
    async fn wait(&self, mut child: Child) -> Result<Option<ExitStatus>, RunnerError> {
        tokio::select! {
            status = child.wait() => Ok(Some(status?)),
            _ = self.cancel.cancelled() => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill cancelled process: {}", e);
                }
                Ok(None)
            }
        }
    }

    async fn record(&self, action_id: &str, status: ActionStatus, message: Option<String>) {
        if let Err(e) = self.actions.set_status(action_id, status, message).await {
            warn!("Failed to record status {} for action {}: {}", status, action_id, e);
        }
    }
}

#[async_trait]
impl Runner for ProcessRunner {
    async fn prepare(&self) -> Result<(), RunnerError> {
        if let Some(path) = &self.executable {
            let metadata = tokio::fs::metadata(path).await?;
            if !metadata.is_file() {
                return Err(RunnerError::failed(format!(
                    "{} is not a file",
                    path.display()
                )));
            }
        }
        Ok(())
    }

    async fn run_action(&self, name: &str) -> Result<(), RunnerError> {
        let (Some(executable), Some((action_id, _))) = (&self.executable, &self.action) else {
            return Err(RunnerError::failed(format!("runner was not built for action {}", name)));
        };

        let status = self
            .actions
            .start(action_id)
            .await
            .map_err(|e| RunnerError::failed(e.to_string()))?;
        match status {
            ActionStatus::Running => {}
            ActionStatus::Aborting => {
                self.record(action_id, ActionStatus::Aborted, Some("aborted before it started".to_string()))
                    .await;
                return Err(RunnerError::aborted(format!("action {} aborted before it started", name)));
            }
            status => {
                debug!("Action {} is {}, not starting it", action_id, status);
                return Err(RunnerError::ActionNotAvailable);
            }
        }

        let child = self.spawn(
            executable,
            &[("UNITER_ACTION_ID", action_id.as_str()), ("UNITER_ACTION_NAME", name)],
        )?;
        info!("Started action {} ({}) pid {:?}", action_id, name, child.id());

        match self.wait(child).await? {
            None => {
                self.record(action_id, ActionStatus::Aborted, Some("aborted by operator".to_string()))
                    .await;
                Err(RunnerError::aborted(format!("action {} cancelled", name)))
            }
            // The action failing is its own result, not an agent error
            Some(status) if status.success() => {
                self.record(action_id, ActionStatus::Completed, None).await;
                Ok(())
            }
            Some(status) => {
                self.record(action_id, ActionStatus::Failed, Some(describe(status))).await;
                Ok(())
            }
        }
    }

    async fn run_hook(&self, name: &str) -> Result<(), RunnerError> {
        let Some(executable) = &self.executable else {
            debug!("Skipping missing {} hook", name);
            return Ok(());
        };

        let child = self.spawn(executable, &[("UNITER_HOOK_NAME", name)])?;
        match self.wait(child).await? {
            None => Err(RunnerError::aborted(format!("hook {} cancelled", name))),
            Some(status) if status.success() => Ok(()),
            Some(status) => Err(RunnerError::failed(describe(status))),
        }
    }

    fn action_data(&self) -> Option<ActionData> {
        self.action
            .as_ref()
            .map(|(_, name)| ActionData::new(name.clone()))
    }
}

fn describe(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit status {}", code),
        None => "terminated by signal".to_string(),
    }
}

async fn forward_output<R: AsyncRead + Unpin>(stream: R, name: &'static str) {
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!("{}: {}", name, line);
    }
}
