//! File-based workflow store
//! One JSON file per record, commits made atomic through a write-ahead journal
//!
//! A commit is first written to `journal/tx_<id>.json`, then each record file
//! is replaced via temp file + rename, then the journal entry is removed.
//! Journals left behind by a crash are replayed when the store is opened;
//! every journal write is a full-record overwrite, so replay is idempotent.
//!
//! A commit whose journal cannot be finished poisons the store: reads and
//! writes fail until the journal is replayed, so no later commit can land
//! before it and no reader sees half of it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use crate::constants::{REQUIRES_APPROVAL, WORKFLOW_AUDIT};
use crate::error::{Result, WorkflowError};
use crate::paths;
use crate::workflow::approval_types::*;
use crate::workflow::traits::{WorkflowCommit, WorkflowStore};
use super::{apply_patch, check_guards, commit_entity_id};

/// Pending writes of one commit
#[derive(Debug, Serialize, Deserialize)]
struct Journal {
    transaction_id: String,
    created_at: DateTime<Utc>,
    writes: Vec<JournalWrite>,
}

#[derive(Debug, Serialize, Deserialize)]
struct JournalWrite {
    /// Path relative to the store root
    path: String,
    contents: Value,
}

#[derive(Debug, Default)]
struct JournalState {
    /// A journal is on disk that was neither finished nor removed
    poisoned: bool,
}

/// Durable store rooted at a data directory
pub struct FileStore {
    root_path: PathBuf,
    journal: RwLock<JournalState>,
}

/// Encode an id into a single safe path component
fn file_component(id: &str) -> String {
    let mut encoded = String::with_capacity(id.len());
    for byte in id.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' => encoded.push(byte as char),
            other => encoded.push_str(&format!("%{:02X}", other)),
        }
    }
    encoded
}

fn record_path(dir: &str, organization_id: &OrganizationId, id: &str) -> String {
    format!("{}/{}/{}.json", dir, file_component(organization_id.as_str()), file_component(id))
}

impl FileStore {
    /// Open (or create) a store at `root_path`, replaying unfinished commits
    pub fn open<P: AsRef<Path>>(root_path: P) -> Result<Self> {
        let root_path = root_path.as_ref().to_path_buf();

        for dir in paths::STORE_DIR_NAMES {
            fs::create_dir_all(root_path.join(dir))?;
        }

        let store = Self {
            root_path,
            journal: RwLock::new(JournalState::default()),
        };

        let replayed = store.replay_journals()?;
        if replayed > 0 {
            log::warn!("Replayed {} unfinished commit(s) in {}", replayed, store.root_path.display());
        }

        Ok(store)
    }

    fn journal_dir(&self) -> PathBuf {
        self.root_path.join(paths::JOURNAL_DIR_NAME)
    }

    /// Write a file so readers see either the old or the new contents
    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| WorkflowError::Storage(format!("No parent directory for {:?}", path)))?;
        fs::create_dir_all(parent)?;

        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        temp.write_all(contents)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| WorkflowError::Io(e.error))?;
        Ok(())
    }

    fn read_record<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| WorkflowError::Storage(format!("Failed to deserialize {:?}: {}", path, e)))
    }

    /// All records of one kind for one organization, unreadable files skipped
    fn list_records<T: DeserializeOwned>(&self, dir: &str, organization_id: &OrganizationId) -> Result<Vec<T>> {
        let org_dir = self.root_path.join(dir).join(file_component(organization_id.as_str()));
        self.read_dir_records(&org_dir)
    }

    fn read_dir_records<T: DeserializeOwned>(&self, dir: &Path) -> Result<Vec<T>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json") {
                match self.read_record(&path) {
                    Ok(Some(record)) => records.push(record),
                    Ok(None) => {}
                    Err(e) => log::warn!("Skipping unreadable record {:?}: {}", path, e),
                }
            }
        }
        Ok(records)
    }

    /// Records of one kind across every organization
    fn list_all_records<T: DeserializeOwned>(&self, dir: &str) -> Result<Vec<T>> {
        let base = self.root_path.join(dir);
        let mut records = Vec::new();
        for entry in fs::read_dir(&base)? {
            let path = entry?.path();
            if path.is_dir() {
                records.extend(self.read_dir_records::<T>(&path)?);
            }
        }
        Ok(records)
    }

    /// Ids linked from the entity, in link creation order
    fn linked_ids(&self, organization_id: &OrganizationId, entity_id: &EntityId, relationship_type: &str) -> Result<Vec<String>> {
        let mut links: Vec<Relationship> = self
            .list_records::<Relationship>(paths::RELATIONSHIPS_DIR_NAME, organization_id)?
            .into_iter()
            .filter(|r| &r.from_entity_id == entity_id && r.relationship_type == relationship_type)
            .collect();
        links.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(links.into_iter().map(|r| r.to_entity_id).collect())
    }

    fn apply_journal(&self, journal: &Journal) -> Result<()> {
        for write in &journal.writes {
            if write.path.split('/').any(|c| c == ".." || c.is_empty()) {
                return Err(WorkflowError::Storage(format!("Refusing journal path {}", write.path)));
            }
            let bytes = serde_json::to_vec_pretty(&write.contents)?;
            self.write_atomic(&self.root_path.join(&write.path), &bytes)?;
        }
        Ok(())
    }

    /// Replay whatever a failed commit left behind
    fn recover(&self, state: &mut JournalState) -> Result<()> {
        if !state.poisoned {
            return Ok(());
        }
        let replayed = self.replay_journals().map_err(|e| {
            WorkflowError::Storage(format!("Store unavailable, unfinished commit could not be replayed: {}", e))
        })?;
        state.poisoned = false;
        log::info!("Recovered store after replaying {} unfinished commit(s)", replayed);
        Ok(())
    }

    async fn read_access(&self) -> Result<RwLockReadGuard<'_, JournalState>> {
        {
            let state = self.journal.read().await;
            if !state.poisoned {
                return Ok(state);
            }
        }
        let mut state = self.journal.write().await;
        self.recover(&mut state)?;
        Ok(RwLockWriteGuard::downgrade(state))
    }

    async fn write_access(&self) -> Result<RwLockWriteGuard<'_, JournalState>> {
        let mut state = self.journal.write().await;
        self.recover(&mut state)?;
        Ok(state)
    }

    fn replay_journals(&self) -> Result<usize> {
        let mut journals: Vec<(PathBuf, Journal)> = Vec::new();
        for entry in fs::read_dir(self.journal_dir())? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            match self.read_record::<Journal>(&path)? {
                Some(journal) => journals.push((path, journal)),
                None => continue,
            }
        }
        journals.sort_by(|a, b| a.1.created_at.cmp(&b.1.created_at));

        for (path, journal) in &journals {
            log::info!("Replaying journal {}", journal.transaction_id);
            self.apply_journal(journal)?;
            fs::remove_file(path)?;
        }
        Ok(journals.len())
    }

    /// Persist a journal, apply it, then drop it. Must be called with the
    /// journal write lock held.
    fn write_through_journal(&self, state: &mut JournalState, writes: Vec<JournalWrite>) -> Result<()> {
        let journal = Journal {
            transaction_id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            writes,
        };
        let journal_path = self.journal_dir().join(format!("tx_{}.json", journal.transaction_id));

        let bytes = serde_json::to_vec_pretty(&journal)?;
        self.write_atomic(&journal_path, &bytes)?;

        if let Err(first) = self.apply_journal(&journal) {
            log::warn!("Transaction {} failed to apply, retrying: {}", journal.transaction_id, first);
            if let Err(e) = self.apply_journal(&journal) {
                state.poisoned = true;
                log::error!("Transaction {} left unfinished: {}", journal.transaction_id, e);
                return Err(WorkflowError::Storage(format!(
                    "Commit {} is unfinished and will be completed on recovery: {}",
                    journal.transaction_id, e
                )));
            }
        }
        if let Err(e) = fs::remove_file(&journal_path) {
            state.poisoned = true;
            log::error!("Could not remove journal {}: {}", journal.transaction_id, e);
            return Err(e.into());
        }

        log::debug!("Committed transaction {} ({} writes)", journal.transaction_id, journal.writes.len());
        Ok(())
    }

    fn single_write<T: Serialize>(&self, state: &mut JournalState, path: String, record: &T) -> Result<()> {
        let contents = serde_json::to_value(record)?;
        self.write_through_journal(state, vec![JournalWrite { path, contents }])
    }

    fn entity_record(&self, organization_id: &OrganizationId, entity_id: &EntityId) -> Result<Option<Entity>> {
        let path = record_path(paths::ENTITIES_DIR_NAME, organization_id, entity_id.as_str());
        self.read_record(&self.root_path.join(path))
    }

    fn approval_record(
        &self,
        organization_id: &OrganizationId,
        approval_request_id: &ApprovalRequestId,
    ) -> Result<Option<ApprovalRequest>> {
        let path = record_path(paths::APPROVALS_DIR_NAME, organization_id, approval_request_id.as_str());
        self.read_record(&self.root_path.join(path))
    }
}

#[async_trait]
impl WorkflowStore for FileStore {
    async fn get_entity(&self, organization_id: &OrganizationId, entity_id: &EntityId) -> Result<Option<Entity>> {
        let _state = self.read_access().await?;
        self.entity_record(organization_id, entity_id)
    }

    async fn put_entity(&self, entity: Entity) -> Result<()> {
        let mut state = self.write_access().await?;
        let path = record_path(paths::ENTITIES_DIR_NAME, &entity.organization_id, entity.id.as_str());
        self.single_write(&mut state, path, &entity)
    }

    async fn actor_roles(&self, organization_id: &OrganizationId, user_id: &UserId) -> Result<Vec<String>> {
        let _state = self.read_access().await?;
        let path = record_path(paths::ACTORS_DIR_NAME, organization_id, user_id.as_str());
        Ok(self
            .read_record::<Vec<String>>(&self.root_path.join(path))?
            .unwrap_or_default())
    }

    async fn set_actor_roles(&self, organization_id: &OrganizationId, user_id: &UserId, roles: Vec<String>) -> Result<()> {
        let mut state = self.write_access().await?;
        let path = record_path(paths::ACTORS_DIR_NAME, organization_id, user_id.as_str());
        self.single_write(&mut state, path, &roles)
    }

    async fn latest_config(&self, organization_id: &OrganizationId, entity_type: &str) -> Result<Option<StoredWorkflowConfig>> {
        let _state = self.read_access().await?;
        let configs: Vec<StoredWorkflowConfig> = self.list_records(paths::CONFIGS_DIR_NAME, organization_id)?;
        Ok(configs
            .into_iter()
            .filter(|c| c.entity_type == entity_type)
            .max_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.config_id.cmp(&b.config_id))
            }))
    }

    async fn save_config(&self, config: StoredWorkflowConfig) -> Result<()> {
        let mut state = self.write_access().await?;
        let path = record_path(paths::CONFIGS_DIR_NAME, &config.organization_id, config.config_id.as_str());
        self.single_write(&mut state, path, &config)?;
        log::info!("Stored workflow config {} for {}", config.config_id, config.entity_type);
        Ok(())
    }

    async fn get_approval_request(
        &self,
        organization_id: &OrganizationId,
        approval_request_id: &ApprovalRequestId,
    ) -> Result<Option<ApprovalRequest>> {
        let _state = self.read_access().await?;
        self.approval_record(organization_id, approval_request_id)
    }

    async fn linked_audit_records(&self, organization_id: &OrganizationId, entity_id: &EntityId) -> Result<Vec<WorkflowAuditRecord>> {
        let _state = self.read_access().await?;
        let mut records = Vec::new();
        for id in self.linked_ids(organization_id, entity_id, WORKFLOW_AUDIT)? {
            let path = record_path(paths::AUDIT_DIR_NAME, organization_id, &id);
            if let Some(record) = self.read_record(&self.root_path.join(path))? {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn linked_approval_requests(&self, organization_id: &OrganizationId, entity_id: &EntityId) -> Result<Vec<ApprovalRequest>> {
        let _state = self.read_access().await?;
        let mut requests = Vec::new();
        for id in self.linked_ids(organization_id, entity_id, REQUIRES_APPROVAL)? {
            let path = record_path(paths::APPROVALS_DIR_NAME, organization_id, &id);
            if let Some(request) = self.read_record(&self.root_path.join(path))? {
                requests.push(request);
            }
        }
        Ok(requests)
    }

    async fn commit(&self, commit: WorkflowCommit) -> Result<()> {
        let mut state = self.write_access().await?;
        let org = &commit.organization_id;

        let mut entity = match commit_entity_id(&commit) {
            Some(id) => self.entity_record(org, id)?,
            None => None,
        };
        let guarded_request = match &commit.approval_guard {
            Some(guard) => self.approval_record(org, &guard.approval_request_id)?,
            None => None,
        };
        check_guards(&commit, entity.as_ref(), guarded_request.as_ref())?;

        let mut writes = Vec::new();
        if let Some(record) = &commit.audit_record {
            writes.push(JournalWrite {
                path: record_path(paths::AUDIT_DIR_NAME, org, record.id.as_str()),
                contents: serde_json::to_value(record)?,
            });
        }
        if let (Some(patch), Some(entity)) = (&commit.entity_patch, entity.as_mut()) {
            apply_patch(entity, patch);
            writes.push(JournalWrite {
                path: record_path(paths::ENTITIES_DIR_NAME, org, entity.id.as_str()),
                contents: serde_json::to_value(&*entity)?,
            });
        }
        if let Some(request) = &commit.approval_request {
            writes.push(JournalWrite {
                path: record_path(paths::APPROVALS_DIR_NAME, org, request.id.as_str()),
                contents: serde_json::to_value(request)?,
            });
        }
        for relationship in &commit.relationships {
            writes.push(JournalWrite {
                path: record_path(paths::RELATIONSHIPS_DIR_NAME, org, relationship.id.as_str()),
                contents: serde_json::to_value(relationship)?,
            });
        }

        self.write_through_journal(&mut state, writes)
    }

    async fn approval_counts(&self) -> Result<StatusCountMap> {
        let _state = self.read_access().await?;
        let mut counts = StatusCountMap::new();
        for request in self.list_all_records::<ApprovalRequest>(paths::APPROVALS_DIR_NAME)? {
            counts.increment(request.status);
        }
        Ok(counts)
    }

    async fn audit_record_count(&self) -> Result<usize> {
        let _state = self.read_access().await?;
        Ok(self.list_all_records::<WorkflowAuditRecord>(paths::AUDIT_DIR_NAME)?.len())
    }
}
