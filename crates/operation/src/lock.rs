//! Node-wide machine lock

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Mutual exclusion shared by every execution path on the node that must
/// not overlap with hooks or non-parallel actions
#[derive(Debug, Clone, Default)]
pub struct MachineLock {
    inner: Arc<Mutex<()>>,
}

/// Held machine lock; released on drop
#[derive(Debug)]
pub struct MachineLockGuard {
    _guard: OwnedMutexGuard<()>,
    holder: String,
}

impl MachineLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the lock
    pub async fn acquire(&self, holder: impl Into<String>) -> MachineLockGuard {
        let holder = holder.into();
        debug!("Waiting for machine lock: {}", holder);
        let guard = Arc::clone(&self.inner).lock_owned().await;
        debug!("Acquired machine lock: {}", holder);
        MachineLockGuard {
            _guard: guard,
            holder,
        }
    }

    /// Take the lock only if nobody holds it
    pub fn try_acquire(&self, holder: impl Into<String>) -> Option<MachineLockGuard> {
        let guard = Arc::clone(&self.inner).try_lock_owned().ok()?;
        Some(MachineLockGuard {
            _guard: guard,
            holder: holder.into(),
        })
    }
}

impl MachineLockGuard {
    pub fn holder(&self) -> &str {
        &self.holder
    }
}

impl Drop for MachineLockGuard {
    fn drop(&mut self) {
        debug!("Released machine lock: {}", self.holder);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lock_is_exclusive() {
        let lock = MachineLock::new();
        let guard = lock.acquire("run install hook").await;
        assert_eq!(guard.holder(), "run install hook");
        assert!(lock.clone().try_acquire("other").is_none());

        drop(guard);
        assert!(lock.try_acquire("other").is_some());
    }
}
