//! Test doubles for the operation collaborators

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use uniter_core::action::{ActionDescriptor, ActionStatus};
use uniter_core::hook::HookInfo;

use crate::callbacks::{ActionGetter, Callbacks};
use crate::error::{CallbackError, RunnerError};
use crate::runner::{ActionData, Runner, RunnerFactory};

pub struct MockActionGetter {
    result: Result<Option<ActionDescriptor>, String>,
}

impl MockActionGetter {
    pub fn with_action(descriptor: ActionDescriptor) -> Self {
        Self {
            result: Ok(Some(descriptor)),
        }
    }

    pub fn missing() -> Self {
        Self { result: Ok(None) }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
        }
    }
}

#[async_trait]
impl ActionGetter for MockActionGetter {
    async fn action(&self, _action_id: &str) -> Result<Option<ActionDescriptor>, CallbackError> {
        self.result.clone().map_err(CallbackError::new)
    }
}

/// What the runners built by a [`MockRunnerFactory`] were asked to do
#[derive(Default)]
pub struct RunnerProbe {
    prepare_calls: Mutex<usize>,
    ran_actions: Mutex<Vec<String>>,
    ran_hooks: Mutex<Vec<String>>,
    cancel: Mutex<Option<CancellationToken>>,
}

impl RunnerProbe {
    pub fn prepare_calls(&self) -> usize {
        *self.prepare_calls.lock().unwrap()
    }

    pub fn ran_actions(&self) -> Vec<String> {
        self.ran_actions.lock().unwrap().clone()
    }

    pub fn ran_hooks(&self) -> Vec<String> {
        self.ran_hooks.lock().unwrap().clone()
    }

    pub fn cancel_token(&self) -> Option<CancellationToken> {
        self.cancel.lock().unwrap().clone()
    }
}

struct MockRunner {
    action_name: String,
    prepare_error: Option<String>,
    run_error: Option<String>,
    wait_for_cancel: bool,
    cancel: CancellationToken,
    probe: Arc<RunnerProbe>,
}

impl MockRunner {
    async fn run(&self) -> Result<(), RunnerError> {
        if self.wait_for_cancel {
            self.cancel.cancelled().await;
            return Err(RunnerError::aborted("cancelled"));
        }
        match &self.run_error {
            Some(message) => Err(RunnerError::failed(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Runner for MockRunner {
    async fn prepare(&self) -> Result<(), RunnerError> {
        *self.probe.prepare_calls.lock().unwrap() += 1;
        match &self.prepare_error {
            Some(message) => Err(RunnerError::failed(message.clone())),
            None => Ok(()),
        }
    }

    async fn run_action(&self, name: &str) -> Result<(), RunnerError> {
        self.probe.ran_actions.lock().unwrap().push(name.to_string());
        self.run().await
    }

    async fn run_hook(&self, name: &str) -> Result<(), RunnerError> {
        self.probe.ran_hooks.lock().unwrap().push(name.to_string());
        self.run().await
    }

    fn action_data(&self) -> Option<ActionData> {
        Some(ActionData::new(self.action_name.clone()))
    }
}

type ErrorFn = Box<dyn Fn() -> RunnerError + Send + Sync>;

pub struct MockRunnerFactory {
    action_name: String,
    create_error: Option<ErrorFn>,
    prepare_error: Option<String>,
    run_error: Option<String>,
    wait_for_cancel: bool,
    action_ids: Mutex<Vec<String>>,
    probe: Arc<RunnerProbe>,
}

impl MockRunnerFactory {
    pub fn new(action_name: &str) -> Self {
        Self {
            action_name: action_name.to_string(),
            create_error: None,
            prepare_error: None,
            run_error: None,
            wait_for_cancel: false,
            action_ids: Mutex::new(Vec::new()),
            probe: Arc::new(RunnerProbe::default()),
        }
    }

    pub fn failing(error: impl Fn() -> RunnerError + Send + Sync + 'static) -> Self {
        let mut factory = Self::new("some-action-name");
        factory.create_error = Some(Box::new(error));
        factory
    }

    pub fn with_prepare_error(mut self, message: &str) -> Self {
        self.prepare_error = Some(message.to_string());
        self
    }

    pub fn with_run_error(mut self, message: &str) -> Self {
        self.run_error = Some(message.to_string());
        self
    }

    pub fn waiting_for_cancel(mut self) -> Self {
        self.wait_for_cancel = true;
        self
    }

    pub fn action_ids(&self) -> Vec<String> {
        self.action_ids.lock().unwrap().clone()
    }

    pub fn probe(&self) -> Arc<RunnerProbe> {
        Arc::clone(&self.probe)
    }

    fn build(&self, cancel: CancellationToken) -> Result<Box<dyn Runner>, RunnerError> {
        *self.probe.cancel.lock().unwrap() = Some(cancel.clone());
        if let Some(error) = &self.create_error {
            return Err(error());
        }
        Ok(Box::new(MockRunner {
            action_name: self.action_name.clone(),
            prepare_error: self.prepare_error.clone(),
            run_error: self.run_error.clone(),
            wait_for_cancel: self.wait_for_cancel,
            cancel,
            probe: Arc::clone(&self.probe),
        }))
    }
}

#[async_trait]
impl RunnerFactory for MockRunnerFactory {
    async fn new_action_runner(
        &self,
        action_id: &str,
        cancel: CancellationToken,
    ) -> Result<Box<dyn Runner>, RunnerError> {
        self.action_ids.lock().unwrap().push(action_id.to_string());
        self.build(cancel)
    }

    async fn new_hook_runner(
        &self,
        _hook: &HookInfo,
        cancel: CancellationToken,
    ) -> Result<Box<dyn Runner>, RunnerError> {
        self.build(cancel)
    }
}

pub struct MockCallbacks {
    fail_error: Option<String>,
    status: Mutex<ActionStatus>,
    failed_actions: Mutex<Vec<(String, String)>>,
    executing: Mutex<Vec<String>>,
}

impl Default for MockCallbacks {
    fn default() -> Self {
        Self {
            fail_error: None,
            status: Mutex::new(ActionStatus::Running),
            failed_actions: Mutex::new(Vec::new()),
            executing: Mutex::new(Vec::new()),
        }
    }
}

impl MockCallbacks {
    pub fn with_fail_error(mut self, message: &str) -> Self {
        self.fail_error = Some(message.to_string());
        self
    }

    pub fn with_status(self, status: ActionStatus) -> Self {
        self.set_status(status);
        self
    }

    pub fn set_status(&self, status: ActionStatus) {
        *self.status.lock().unwrap() = status;
    }

    pub fn failed_actions(&self) -> Vec<(String, String)> {
        self.failed_actions.lock().unwrap().clone()
    }

    pub fn executing_messages(&self) -> Vec<String> {
        self.executing.lock().unwrap().clone()
    }
}

#[async_trait]
impl Callbacks for MockCallbacks {
    async fn fail_action(&self, action_id: &str, message: &str) -> Result<(), CallbackError> {
        self.failed_actions
            .lock()
            .unwrap()
            .push((action_id.to_string(), message.to_string()));
        match &self.fail_error {
            Some(message) => Err(CallbackError::new(message.clone())),
            None => Ok(()),
        }
    }

    fn set_executing(&self, message: &str) {
        self.executing.lock().unwrap().push(message.to_string());
    }

    async fn action_status(&self, _action_id: &str) -> Result<ActionStatus, CallbackError> {
        Ok(*self.status.lock().unwrap())
    }
}
