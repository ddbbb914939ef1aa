//! Operation state model

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hook::HookInfo;
use crate::{Error, Result};

/// The kind of unit of work the agent is busy with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    /// Nothing in flight, waiting for the next unit of work
    #[default]
    Continue,
    RunHook,
    RunAction,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Continue => "continue",
            Self::RunHook => "run-hook",
            Self::RunAction => "run-action",
        };
        f.write_str(s)
    }
}

/// Position within the current kind's lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[default]
    Pending,
    Done,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Done => f.write_str("done"),
        }
    }
}

/// Persisted record of what the agent is doing and how far it got.
///
/// Phases never modify a state in place; each one returns a new value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct State {
    pub kind: Kind,
    pub step: Step,
    /// Set only while `kind` is `RunAction`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    /// Hook waiting to run; survives unrelated operations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook: Option<HookInfo>,
    /// Sticky: the install sequence has begun
    #[serde(default)]
    pub started: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub charm_url: String,
}

impl State {
    pub fn new(kind: Kind, step: Step) -> Self {
        Self {
            kind,
            step,
            ..Self::default()
        }
    }

    pub fn with_action_id(mut self, action_id: impl Into<String>) -> Self {
        self.action_id = Some(action_id.into());
        self
    }

    pub fn with_hook(mut self, hook: impl Into<HookInfo>) -> Self {
        self.hook = Some(hook.into());
        self
    }

    pub fn with_started(mut self, started: bool) -> Self {
        self.started = started;
        self
    }

    pub fn with_charm_url(mut self, charm_url: impl Into<String>) -> Self {
        self.charm_url = charm_url.into();
        self
    }

    /// Check the structural invariants of the record
    pub fn validate(&self) -> Result<()> {
        match (self.kind, &self.action_id) {
            (Kind::RunAction, None) => {
                return Err(Error::InvalidState(
                    "run-action state is missing an action id".to_string(),
                ));
            }
            (Kind::Continue | Kind::RunHook, Some(id)) => {
                return Err(Error::InvalidState(format!(
                    "{} state carries unexpected action id {:?}",
                    self.kind, id
                )));
            }
            _ => {}
        }
        if self.kind == Kind::RunHook && self.hook.is_none() {
            return Err(Error::InvalidState(
                "run-hook state is missing a hook".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind, self.step)?;
        if let Some(id) = &self.action_id {
            write!(f, " action {}", id)?;
        }
        if let Some(hook) = &self.hook {
            write!(f, " hook {}", hook.kind)?;
        }
        Ok(())
    }
}
