//! Cancellation driven by remote action changes

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use uniter_core::action::ActionStatus;
use uniter_core::remote::Snapshot;

use crate::callbacks::Callbacks;

/// Watches remote snapshots for one action and cancels it when aborting.
///
/// The token latches: a cancel requested before the runner starts waiting
/// is observed as soon as it does.
#[derive(Debug)]
pub struct ActionWatcher {
    action_id: String,
    /// Last accepted version plus one; zero until a version is accepted
    last_seen: AtomicU64,
    fired: AtomicBool,
    cancel: CancellationToken,
}

impl ActionWatcher {
    pub fn new(action_id: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            action_id: action_id.into(),
            last_seen: AtomicU64::new(0),
            fired: AtomicBool::new(false),
            cancel,
        }
    }

    /// Token handed to the runner
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Accept a version only if it is strictly newer than every accepted one
    pub fn accept(&self, version: u64) -> bool {
        let marker = version.saturating_add(1);
        self.last_seen.fetch_max(marker, Ordering::AcqRel) < marker
    }

    /// Fire the cancellation token; returns false if it already fired
    pub fn fire(&self) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.cancel.cancel();
        true
    }

    /// Handle a remote snapshot. Returns true if this call fired the token.
    pub async fn remote_state_changed(&self, snapshot: &Snapshot, callbacks: &dyn Callbacks) -> bool {
        let Some(version) = snapshot.action_version(&self.action_id) else {
            return false;
        };
        if !self.accept(version) {
            debug!(
                "Ignoring stale version {} for action {}",
                version, self.action_id
            );
            return false;
        }

        match callbacks.action_status(&self.action_id).await {
            Ok(ActionStatus::Aborting) => {
                let fired = self.fire();
                if fired {
                    info!("Action {} is aborting, cancelling run", self.action_id);
                }
                fired
            }
            Ok(status) => {
                debug!(
                    "Action {} changed to version {} with status {}",
                    self.action_id, version, status
                );
                false
            }
            Err(e) => {
                warn!("Failed to get status of action {}: {}", self.action_id, e);
                false
            }
        }
    }
}
