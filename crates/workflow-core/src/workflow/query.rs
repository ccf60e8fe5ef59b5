//! Read side: current state, history and pending approvals of an entity

use workflow_types::api::{HistoryEntry, PendingApprovalEntry, WorkflowStatusResponse};

use crate::error::{Result, WorkflowError};
use super::approval_types::{newest_first, ApprovalRequest, Entity, EntityId, OrganizationId, WorkflowAuditRecord};
use super::traits::WorkflowStore;

/// Which optional sections to include in a status report
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusOptions {
    pub include_history: bool,
    pub include_pending: bool,
}

pub async fn entity_status<S: WorkflowStore + ?Sized>(
    store: &S,
    organization_id: &OrganizationId,
    entity_id: &EntityId,
    options: StatusOptions,
) -> Result<WorkflowStatusResponse> {
    let entity = store
        .get_entity(organization_id, entity_id)
        .await?
        .ok_or_else(|| WorkflowError::EntityNotFound {
            entity_id: entity_id.to_string(),
            organization_id: organization_id.to_string(),
        })?;

    let history = if options.include_history {
        Some(history(store, &entity).await?)
    } else {
        None
    };
    let pending_approvals = if options.include_pending {
        Some(pending_approvals(store, &entity).await?)
    } else {
        None
    };

    let metadata = entity.metadata;
    Ok(WorkflowStatusResponse {
        entity_id: entity.id.to_string(),
        entity_type: entity.entity_type,
        entity_name: entity.name,
        current_state: metadata.workflow_state,
        last_state_change: metadata.last_state_change,
        last_changed_by: metadata.last_changed_by.map(|u| u.to_string()),
        assigned_to: metadata.assigned_to,
        history,
        pending_approvals,
    })
}

/// Executed transitions of the entity, newest first
pub async fn history<S: WorkflowStore + ?Sized>(store: &S, entity: &Entity) -> Result<Vec<HistoryEntry>> {
    let mut records = store.linked_audit_records(&entity.organization_id, &entity.id).await?;
    newest_first(&mut records, |r: &WorkflowAuditRecord| r.created_at);
    Ok(records.into_iter().map(history_entry).collect())
}

/// Approval requests of the entity that are still pending, newest first
pub async fn pending_approvals<S: WorkflowStore + ?Sized>(
    store: &S,
    entity: &Entity,
) -> Result<Vec<PendingApprovalEntry>> {
    let mut requests: Vec<ApprovalRequest> = store
        .linked_approval_requests(&entity.organization_id, &entity.id)
        .await?
        .into_iter()
        .filter(ApprovalRequest::is_pending)
        .collect();
    newest_first(&mut requests, |r: &ApprovalRequest| r.created_at);
    Ok(requests.into_iter().map(pending_entry).collect())
}

fn history_entry(record: WorkflowAuditRecord) -> HistoryEntry {
    HistoryEntry {
        audit_id: record.id.to_string(),
        from_state: record.from_state,
        to_state: record.to_state,
        changed_by: record.changed_by.to_string(),
        notes: record.notes,
        approval_data: record.approval_data,
        approval_request_id: record.approval_request_id.map(|id| id.to_string()),
        forced: record.forced,
        changed_at: record.created_at,
    }
}

fn pending_entry(request: ApprovalRequest) -> PendingApprovalEntry {
    PendingApprovalEntry {
        approvals_received: request.approvals_received(),
        approval_request_id: request.id.to_string(),
        from_state: request.from_state,
        to_state: request.to_state,
        requested_by: request.requested_by.to_string(),
        notes: request.notes,
        approval_data: request.approval_data,
        required_approvals: request.required_approvals,
        approval_roles: request.approval_roles,
        rules: request.rules,
        requested_at: request.created_at,
    }
}
