//! Core library for the unit agent
//!
//! This crate contains the data shared by every execution path:
//! - The persisted operation state and its store
//! - Hook descriptors
//! - Action descriptors and statuses
//! - Remote state snapshots delivered by the watch stream

pub mod action;
pub mod error;
pub mod hook;
pub mod remote;
pub mod state;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
