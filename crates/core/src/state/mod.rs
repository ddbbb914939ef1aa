//! State module
//!
//! This module contains the persisted operation state and its storage.

mod file_store;
mod model;
mod repository;

pub use file_store::FileStateStore;
pub use model::*;
pub use repository::StateStore;
