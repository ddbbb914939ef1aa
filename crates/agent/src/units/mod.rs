//! Unit lifecycle requests over the in-process hub
//!
//! The hub is where an embedding process plugs in its own workers: anything
//! holding a clone of the [`MemoryHub`] handed to [`UnitsManager::start`] can
//! publish requests and subscribe to the response topics.

mod hub;
mod manager;

pub use hub::MemoryHub;
pub use manager::UnitsManager;

pub const STOP_UNIT_TOPIC: &str = "stop-unit";
pub const STOP_UNIT_RESPONSE_TOPIC: &str = "stop-unit-response";
pub const START_UNIT_TOPIC: &str = "start-unit";
pub const START_UNIT_RESPONSE_TOPIC: &str = "start-unit-response";
pub const UNIT_STATUS_TOPIC: &str = "unit-status";
pub const UNIT_STATUS_RESPONSE_TOPIC: &str = "unit-status-response";
