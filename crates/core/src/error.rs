//! Error types for the core library

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Action not found: {0}")]
    ActionNotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Unknown hook kind: {0}")]
    UnknownHook(String),
}
