//! Transition execution
//!
//! An executed transition is three writes: the audit record, the entity's
//! metadata patch and the `WORKFLOW_AUDIT` edge. They always travel in one
//! commit guarded by the entity state read during validation.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::constants::WORKFLOW_AUDIT;
use crate::error::Result;
use super::approval_types::{ApprovalRequestId, AuditId, Entity, Relationship, UserId, WorkflowAuditRecord};
use super::traits::{EntityPatch, StateGuard, WorkflowCommit, WorkflowStore};

/// One validated move of an entity, ready to execute
#[derive(Debug, Clone)]
pub struct TransitionExecution {
    pub from_state: String,
    pub to_state: String,
    pub actor: UserId,
    pub notes: Option<String>,
    pub approval_data: Option<Value>,
    pub approval_request_id: Option<ApprovalRequestId>,
    pub forced: bool,
}

impl TransitionExecution {
    /// Build the commit for this execution against the entity as it was read.
    /// Returns the audit id, which doubles as the transition id.
    pub fn into_commit(self, entity: &Entity, now: DateTime<Utc>) -> (AuditId, WorkflowCommit) {
        let audit_id = AuditId::generate();
        let organization_id = entity.organization_id.clone();

        let mut commit = WorkflowCommit::new(organization_id.clone());
        commit.state_guard = Some(StateGuard {
            entity_id: entity.id.clone(),
            expected_state: entity.metadata.workflow_state.clone(),
        });
        commit.entity_patch = Some(EntityPatch {
            entity_id: entity.id.clone(),
            workflow_state: self.to_state.clone(),
            changed_at: now,
            changed_by: self.actor.clone(),
        });
        commit.relationships.push(Relationship::link(
            organization_id.clone(),
            entity.id.clone(),
            audit_id.as_str(),
            WORKFLOW_AUDIT,
            now,
        ));
        commit.audit_record = Some(WorkflowAuditRecord {
            id: audit_id.clone(),
            organization_id,
            entity_id: entity.id.clone(),
            from_state: self.from_state,
            to_state: self.to_state,
            changed_by: self.actor,
            notes: self.notes,
            approval_data: self.approval_data,
            approval_request_id: self.approval_request_id,
            forced: self.forced,
            created_at: now,
        });

        (audit_id, commit)
    }
}

/// Execute a transition immediately
pub async fn execute<S: WorkflowStore + ?Sized>(
    store: &S,
    entity: &Entity,
    execution: TransitionExecution,
) -> Result<AuditId> {
    let from_state = execution.from_state.clone();
    let to_state = execution.to_state.clone();
    let (audit_id, commit) = execution.into_commit(entity, Utc::now());

    store.commit(commit).await?;

    log::info!(
        "Entity {} moved {} -> {} (transition {})",
        entity.id, from_state, to_state, audit_id
    );
    Ok(audit_id)
}
