//! In-memory workflow store
//!
//! All tables sit behind one lock, so a commit holding the write guard is
//! atomic with respect to every other reader and writer.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use crate::constants::{REQUIRES_APPROVAL, WORKFLOW_AUDIT};
use crate::error::Result;
use crate::workflow::approval_types::*;
use crate::workflow::traits::{WorkflowCommit, WorkflowStore};
use super::{apply_patch, check_guards, commit_entity_id};

#[derive(Default)]
struct Tables {
    entities: HashMap<(OrganizationId, EntityId), Entity>,
    actors: HashMap<(OrganizationId, UserId), Vec<String>>,
    configs: Vec<StoredWorkflowConfig>,
    approvals: Vec<ApprovalRequest>,
    audit_records: Vec<WorkflowAuditRecord>,
    relationships: Vec<Relationship>,
}

impl Tables {
    fn linked_ids(&self, organization_id: &OrganizationId, entity_id: &EntityId, relationship_type: &str) -> Vec<String> {
        self.relationships
            .iter()
            .filter(|r| {
                &r.organization_id == organization_id
                    && &r.from_entity_id == entity_id
                    && r.relationship_type == relationship_type
            })
            .map(|r| r.to_entity_id.clone())
            .collect()
    }
}

/// Volatile store used for development and tests
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn get_entity(&self, organization_id: &OrganizationId, entity_id: &EntityId) -> Result<Option<Entity>> {
        let tables = self.tables.read().await;
        Ok(tables.entities.get(&(organization_id.clone(), entity_id.clone())).cloned())
    }

    async fn put_entity(&self, entity: Entity) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .entities
            .insert((entity.organization_id.clone(), entity.id.clone()), entity);
        Ok(())
    }

    async fn actor_roles(&self, organization_id: &OrganizationId, user_id: &UserId) -> Result<Vec<String>> {
        let tables = self.tables.read().await;
        Ok(tables
            .actors
            .get(&(organization_id.clone(), user_id.clone()))
            .cloned()
            .unwrap_or_default())
    }

    async fn set_actor_roles(&self, organization_id: &OrganizationId, user_id: &UserId, roles: Vec<String>) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .actors
            .insert((organization_id.clone(), user_id.clone()), roles);
        Ok(())
    }

    async fn latest_config(&self, organization_id: &OrganizationId, entity_type: &str) -> Result<Option<StoredWorkflowConfig>> {
        let tables = self.tables.read().await;
        // Later insertions win ties on created_at
        Ok(tables
            .configs
            .iter()
            .filter(|c| &c.organization_id == organization_id && c.entity_type == entity_type)
            .fold(None::<&StoredWorkflowConfig>, |newest, c| match newest {
                Some(n) if n.created_at > c.created_at => Some(n),
                _ => Some(c),
            })
            .cloned())
    }

    async fn save_config(&self, config: StoredWorkflowConfig) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.configs.push(config);
        Ok(())
    }

    async fn get_approval_request(
        &self,
        organization_id: &OrganizationId,
        approval_request_id: &ApprovalRequestId,
    ) -> Result<Option<ApprovalRequest>> {
        let tables = self.tables.read().await;
        Ok(tables
            .approvals
            .iter()
            .find(|a| &a.organization_id == organization_id && &a.id == approval_request_id)
            .cloned())
    }

    async fn linked_audit_records(&self, organization_id: &OrganizationId, entity_id: &EntityId) -> Result<Vec<WorkflowAuditRecord>> {
        let tables = self.tables.read().await;
        let linked = tables.linked_ids(organization_id, entity_id, WORKFLOW_AUDIT);
        Ok(tables
            .audit_records
            .iter()
            .filter(|a| &a.organization_id == organization_id && linked.iter().any(|id| id == a.id.as_str()))
            .cloned()
            .collect())
    }

    async fn linked_approval_requests(&self, organization_id: &OrganizationId, entity_id: &EntityId) -> Result<Vec<ApprovalRequest>> {
        let tables = self.tables.read().await;
        let linked = tables.linked_ids(organization_id, entity_id, REQUIRES_APPROVAL);
        Ok(tables
            .approvals
            .iter()
            .filter(|a| &a.organization_id == organization_id && linked.iter().any(|id| id == a.id.as_str()))
            .cloned()
            .collect())
    }

    async fn commit(&self, commit: WorkflowCommit) -> Result<()> {
        let mut tables = self.tables.write().await;
        let org = commit.organization_id.clone();

        let entity_key = commit_entity_id(&commit).map(|id| (org.clone(), id.clone()));
        let guarded_request = commit.approval_guard.as_ref().and_then(|g| {
            tables
                .approvals
                .iter()
                .find(|a| a.organization_id == org && a.id == g.approval_request_id)
        });
        check_guards(
            &commit,
            entity_key.as_ref().and_then(|k| tables.entities.get(k)),
            guarded_request,
        )?;

        // Nothing below can fail
        if let Some(record) = commit.audit_record {
            tables.audit_records.push(record);
        }

        if let (Some(patch), Some(key)) = (&commit.entity_patch, &entity_key) {
            if let Some(entity) = tables.entities.get_mut(key) {
                apply_patch(entity, patch);
            }
        }

        if let Some(request) = commit.approval_request {
            match tables.approvals.iter_mut().find(|a| a.id == request.id) {
                Some(existing) => *existing = request,
                None => tables.approvals.push(request),
            }
        }

        tables.relationships.extend(commit.relationships);
        Ok(())
    }

    async fn approval_counts(&self) -> Result<StatusCountMap> {
        let tables = self.tables.read().await;
        let mut counts = StatusCountMap::new();
        for request in &tables.approvals {
            counts.increment(request.status);
        }
        Ok(counts)
    }

    async fn audit_record_count(&self) -> Result<usize> {
        Ok(self.tables.read().await.audit_records.len())
    }
}
