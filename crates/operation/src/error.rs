//! Error types for uniter-operation

use thiserror::Error;

/// Result type alias for operation phases
pub type Result<T> = std::result::Result<T, OperationError>;

/// Errors reported by a runner or by the runner factory
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The action definition is malformed; recorded as the action's own failure
    #[error("cannot run \"{action}\" action: {message}")]
    BadAction { action: String, message: String },

    /// The action was cancelled or removed before the agent reached it
    #[error("action no longer available")]
    ActionNotAvailable,

    /// The running action was stopped through its cancellation token
    #[error("action aborted: {message}")]
    Aborted { message: String },

    /// The hook or action ran and reported failure
    #[error("{message}")]
    Failed { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunnerError {
    /// Create a BadAction error
    pub fn bad_action(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadAction {
            action: action.into(),
            message: message.into(),
        }
    }

    /// Create an Aborted error
    pub fn aborted(message: impl Into<String>) -> Self {
        Self::Aborted {
            message: message.into(),
        }
    }

    /// Create a Failed error
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Check if this error came from the cancellation path
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }
}

/// Error returned by a node-agent callback
#[derive(Debug, Error)]
#[error("{message}")]
pub struct CallbackError {
    message: String,
}

impl CallbackError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors that can end an operation phase
#[derive(Debug, Error)]
pub enum OperationError {
    /// Not a failure: abandon this unit of work without running it
    #[error("skipped operation")]
    SkipExecute,

    /// Failed to fetch the action definition
    #[error("cannot fetch action \"{action_id}\": {message}")]
    FetchAction { action_id: String, message: String },

    /// Runner construction failed for a reason unrelated to the action itself
    #[error("cannot create runner for {target}: {source}")]
    CreateRunner {
        target: String,
        #[source]
        source: RunnerError,
    },

    /// Runner preparation failed
    #[error(transparent)]
    Runner(#[from] RunnerError),

    /// A callback failed
    #[error(transparent)]
    Callback(#[from] CallbackError),

    /// The action ran and failed or was aborted
    #[error("running action \"{action_id}\": {source}")]
    RunAction {
        action_id: String,
        #[source]
        source: RunnerError,
    },

    /// The hook ran and failed
    #[error("running hook \"{hook}\": {source}")]
    RunHook {
        hook: String,
        #[source]
        source: RunnerError,
    },

    /// Persisting the state failed
    #[error("State error: {0}")]
    State(#[from] uniter_core::Error),
}

impl OperationError {
    /// Check for the skip sentinel
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::SkipExecute)
    }

    /// Get the runner error behind a run failure, if any
    pub fn runner_cause(&self) -> Option<&RunnerError> {
        match self {
            Self::CreateRunner { source, .. }
            | Self::RunAction { source, .. }
            | Self::RunHook { source, .. } => Some(source),
            Self::Runner(source) => Some(source),
            _ => None,
        }
    }
}
