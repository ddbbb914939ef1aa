//! Operation engine for the unit agent
//!
//! This crate decides, persists and drives the units of work (hooks and
//! actions) the agent runs. Every unit of work is an [`Operation`] taken
//! through prepare, execute and commit by the [`Executor`], which persists
//! the returned state after each phase and holds the [`MachineLock`] when
//! the operation asks for it.

mod callbacks;
mod error;
mod executor;
mod factory;
mod lock;
mod operation;
mod run_action;
mod run_hook;
mod runner;
mod watch;

#[cfg(test)]
mod mocks;

pub use callbacks::{ActionGetter, Callbacks};
pub use error::{CallbackError, OperationError, Result, RunnerError};
pub use executor::Executor;
pub use factory::Factory;
pub use lock::{MachineLock, MachineLockGuard};
pub use operation::Operation;
pub use run_action::RunAction;
pub use run_hook::RunHook;
pub use runner::{ActionData, Runner, RunnerFactory};
pub use watch::ActionWatcher;

pub use tokio_util::sync::CancellationToken;
