//! File-based action queue
//!
//! Actions are kept as a JSON array in `actions.json`. The operator (or any
//! other tool) may edit the file while the agent runs; setting an action's
//! status to `aborting` asks the agent to stop it.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use uniter_core::action::{ActionDescriptor, ActionStatus};
use uniter_core::remote::Snapshot;
use uniter_core::{Error, Result};
use uniter_operation::{ActionGetter, CallbackError};

/// An action as stored in the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ActionRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            parallel: false,
            status: ActionStatus::Pending,
            message: None,
            enqueued_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn descriptor(&self) -> ActionDescriptor {
        ActionDescriptor::new(self.name.clone()).with_parallel(self.parallel)
    }
}

/// Action queue backed by a JSON file
pub struct FileActionStore {
    path: PathBuf,
    /// Last status and version handed out per action id
    seen: Mutex<HashMap<String, (ActionStatus, u64)>>,
    /// Serializes read-modify-write cycles on the file
    write_lock: Mutex<()>,
}

impl FileActionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            seen: Mutex::new(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<ActionRecord>> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(Vec::new());
        }
        let content = tokio::fs::read_to_string(&self.path).await?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    async fn persist(&self, records: &[ActionRecord]) -> Result<()> {
        let content = serde_json::to_string_pretty(records)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Add a new pending action to the queue
    pub async fn enqueue(&self, name: &str, parallel: bool) -> Result<ActionRecord> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;
        let mut record = ActionRecord::new(name);
        record.parallel = parallel;
        records.push(record.clone());
        self.persist(&records).await?;
        debug!("Enqueued action {} ({})", record.id, record.name);
        Ok(record)
    }

    pub async fn get(&self, action_id: &str) -> Result<Option<ActionRecord>> {
        let records = self.load().await?;
        Ok(records.into_iter().find(|r| r.id == action_id))
    }

    /// Ids of pending actions, oldest first
    pub async fn pending(&self) -> Result<Vec<String>> {
        let mut records: Vec<ActionRecord> = self
            .load()
            .await?
            .into_iter()
            .filter(|r| r.status == ActionStatus::Pending)
            .collect();
        records.sort_by(|a, b| a.enqueued_at.cmp(&b.enqueued_at));
        Ok(records.into_iter().map(|r| r.id).collect())
    }

    pub async fn set_status(
        &self,
        action_id: &str,
        status: ActionStatus,
        message: Option<String>,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;
        let record = records
            .iter_mut()
            .find(|r| r.id == action_id)
            .ok_or_else(|| Error::ActionNotFound(action_id.to_string()))?;

        record.status = status;
        if message.is_some() {
            record.message = message;
        }
        if status.is_terminal() {
            record.completed_at = Some(Utc::now());
        }
        self.persist(&records).await?;
        debug!("Action {} is now {}", action_id, status);
        Ok(())
    }

    /// Move an action to `running` if it is still `pending`.
    ///
    /// Returns the status the action ends up with; anything other than
    /// `Running` means the action must not be started.
    pub async fn start(&self, action_id: &str) -> Result<ActionStatus> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;
        let record = records
            .iter_mut()
            .find(|r| r.id == action_id)
            .ok_or_else(|| Error::ActionNotFound(action_id.to_string()))?;

        match record.status {
            ActionStatus::Pending => {
                record.status = ActionStatus::Running;
                self.persist(&records).await?;
                debug!("Action {} is now running", action_id);
                Ok(ActionStatus::Running)
            }
            status => Ok(status),
        }
    }

    /// Finalise actions asked to abort while nothing is running them.
    ///
    /// Only safe to call between operations. Returns the ids aborted.
    pub async fn settle_aborting(&self) -> Result<Vec<String>> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;
        let now = Utc::now();
        let mut settled = Vec::new();

        for record in records
            .iter_mut()
            .filter(|r| r.status == ActionStatus::Aborting)
        {
            record.status = ActionStatus::Aborted;
            record.message = Some("aborted before it started".to_string());
            record.completed_at = Some(now);
            settled.push(record.id.clone());
        }
        if !settled.is_empty() {
            self.persist(&records).await?;
            debug!("Aborted idle actions {:?}", settled);
        }
        Ok(settled)
    }

    /// Re-read the queue and report every action whose status changed
    /// since the last refresh, each with a bumped version
    pub async fn refresh(&self) -> Result<Snapshot> {
        let records = self.load().await?;
        let mut seen = self.seen.lock().await;
        let mut snapshot = Snapshot::default();

        for record in &records {
            let entry = seen.entry(record.id.clone()).or_insert((record.status, 0));
            if entry.1 == 0 || entry.0 != record.status {
                entry.0 = record.status;
                entry.1 += 1;
                snapshot.action_changed.insert(record.id.clone(), entry.1);
            }
        }
        seen.retain(|id, _| records.iter().any(|r| &r.id == id));

        Ok(snapshot)
    }
}

#[async_trait]
impl ActionGetter for FileActionStore {
    async fn action(&self, action_id: &str) -> std::result::Result<Option<ActionDescriptor>, CallbackError> {
        let record = self
            .get(action_id)
            .await
            .map_err(|e| CallbackError::new(e.to_string()))?;
        Ok(record.map(|r| r.descriptor()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (FileActionStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileActionStore::new(temp_dir.path().join("actions.json"));
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_enqueue_and_pending() {
        let (store, _temp) = create_test_store();
        assert!(store.pending().await.unwrap().is_empty());

        let first = store.enqueue("backup", false).await.unwrap();
        let second = store.enqueue("snapshot", true).await.unwrap();
        assert_eq!(store.pending().await.unwrap(), vec![first.id.clone(), second.id.clone()]);

        store
            .set_status(&first.id, ActionStatus::Running, None)
            .await
            .unwrap();
        assert_eq!(store.pending().await.unwrap(), vec![second.id.clone()]);

        let descriptor = store.action(&second.id).await.unwrap().unwrap();
        assert_eq!(descriptor, ActionDescriptor::new("snapshot").with_parallel(true));
        assert!(store.action("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_status_terminal_records_completion() {
        let (store, _temp) = create_test_store();
        let record = store.enqueue("backup", false).await.unwrap();

        store
            .set_status(&record.id, ActionStatus::Failed, Some("exit status 2".to_string()))
            .await
            .unwrap();
        let stored = store.get(&record.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ActionStatus::Failed);
        assert_eq!(stored.message.as_deref(), Some("exit status 2"));
        assert!(stored.completed_at.is_some());

        let err = store
            .set_status("missing", ActionStatus::Failed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ActionNotFound(_)));
    }

    #[tokio::test]
    async fn test_start_only_from_pending() {
        let (store, _temp) = create_test_store();
        let record = store.enqueue("backup", false).await.unwrap();
        assert_eq!(store.start(&record.id).await.unwrap(), ActionStatus::Running);
        assert_eq!(store.start(&record.id).await.unwrap(), ActionStatus::Running);

        let aborting = store.enqueue("backup", false).await.unwrap();
        store
            .set_status(&aborting.id, ActionStatus::Aborting, None)
            .await
            .unwrap();
        assert_eq!(store.start(&aborting.id).await.unwrap(), ActionStatus::Aborting);
        let stored = store.get(&aborting.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ActionStatus::Aborting);

        assert!(matches!(
            store.start("missing").await.unwrap_err(),
            Error::ActionNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_settle_aborting_finalises_idle_actions() {
        let (store, _temp) = create_test_store();
        let idle = store.enqueue("backup", false).await.unwrap();
        let untouched = store.enqueue("backup", false).await.unwrap();
        store
            .set_status(&idle.id, ActionStatus::Aborting, None)
            .await
            .unwrap();

        assert_eq!(store.settle_aborting().await.unwrap(), vec![idle.id.clone()]);
        let stored = store.get(&idle.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ActionStatus::Aborted);
        assert!(stored.completed_at.is_some());
        let stored = store.get(&untouched.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ActionStatus::Pending);

        assert!(store.settle_aborting().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_bumps_versions_on_status_change() {
        let (store, _temp) = create_test_store();
        let record = store.enqueue("backup", false).await.unwrap();

        let first = store.refresh().await.unwrap();
        assert_eq!(first.action_version(&record.id), Some(1));

        // Nothing changed
        assert!(store.refresh().await.unwrap().is_empty());

        store
            .set_status(&record.id, ActionStatus::Aborting, None)
            .await
            .unwrap();
        let changed = store.refresh().await.unwrap();
        assert_eq!(changed.action_version(&record.id), Some(2));
    }
}
