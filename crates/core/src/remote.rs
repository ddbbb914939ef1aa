//! Snapshots delivered by the remote state watcher

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One update from the orchestrator watch stream.
///
/// Every live operation receives every snapshot and picks out the entries
/// for the action it is running.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Version counter per action id; bumped whenever the action changes
    #[serde(default)]
    pub action_changed: HashMap<String, u64>,
}

impl Snapshot {
    /// Snapshot reporting a single action change
    pub fn action_changed(action_id: impl Into<String>, version: u64) -> Self {
        let mut action_changed = HashMap::new();
        action_changed.insert(action_id.into(), version);
        Self { action_changed }
    }

    /// Get the reported version for an action id
    pub fn action_version(&self, action_id: &str) -> Option<u64> {
        self.action_changed.get(action_id).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.action_changed.is_empty()
    }
}
