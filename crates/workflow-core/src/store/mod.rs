//! Workflow store implementations

pub mod file;
pub mod import;
pub mod memory;

pub use file::FileStore;
pub use import::StoreImport;
pub use memory::MemoryStore;

use crate::error::{Result, WorkflowError};
use crate::workflow::approval_types::{ApprovalRequest, Entity, EntityId};
use crate::workflow::traits::{EntityPatch, WorkflowCommit};

const UNSET_STATE: &str = "<unset>";

/// Check a commit's guards against the records currently stored.
/// Shared by every store.
pub(crate) fn check_guards(
    commit: &WorkflowCommit,
    entity: Option<&Entity>,
    approval_request: Option<&ApprovalRequest>,
) -> Result<()> {
    if let Some(guard) = &commit.state_guard {
        let entity = entity.ok_or_else(|| WorkflowError::EntityNotFound {
            entity_id: guard.entity_id.to_string(),
            organization_id: commit.organization_id.to_string(),
        })?;

        if entity.metadata.workflow_state != guard.expected_state {
            return Err(WorkflowError::StateMismatch {
                expected: guard.expected_state.clone().unwrap_or_else(|| UNSET_STATE.to_string()),
                actual: entity
                    .metadata
                    .workflow_state
                    .clone()
                    .unwrap_or_else(|| UNSET_STATE.to_string()),
            });
        }
    }

    if let Some(patch) = &commit.entity_patch {
        if entity.is_none() {
            return Err(WorkflowError::EntityNotFound {
                entity_id: patch.entity_id.to_string(),
                organization_id: commit.organization_id.to_string(),
            });
        }
    }

    if let Some(guard) = &commit.approval_guard {
        let request = approval_request
            .ok_or_else(|| WorkflowError::ApprovalNotFound(guard.approval_request_id.to_string()))?;

        if !request.is_pending() {
            return Err(WorkflowError::ApprovalNotPending {
                id: request.id.to_string(),
                status: request.status.as_str().to_string(),
            });
        }

        if request.decisions.len() != guard.expected_decisions {
            return Err(WorkflowError::ConcurrentModification(format!(
                "approval request {} received another decision",
                request.id
            )));
        }
    }

    Ok(())
}

/// Entity the commit guards or patches, if any
pub(crate) fn commit_entity_id(commit: &WorkflowCommit) -> Option<&EntityId> {
    commit
        .entity_patch
        .as_ref()
        .map(|p| &p.entity_id)
        .or_else(|| commit.state_guard.as_ref().map(|g| &g.entity_id))
}

pub(crate) fn apply_patch(entity: &mut Entity, patch: &EntityPatch) {
    entity.metadata.workflow_state = Some(patch.workflow_state.clone());
    entity.metadata.last_state_change = Some(patch.changed_at);
    entity.metadata.last_changed_by = Some(patch.changed_by.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::approval_types::OrganizationId;
    use crate::workflow::traits::StateGuard;

    fn guarded_commit(expected: Option<&str>) -> WorkflowCommit {
        let mut commit = WorkflowCommit::new(OrganizationId::new("org"));
        commit.state_guard = Some(StateGuard {
            entity_id: EntityId::new("E1"),
            expected_state: expected.map(str::to_string),
        });
        commit
    }

    #[test]
    fn test_state_guard_matches() {
        let entity = Entity::new(EntityId::new("E1"), OrganizationId::new("org"), "INVOICE", "x")
            .with_state("DRAFT");
        assert!(check_guards(&guarded_commit(Some("DRAFT")), Some(&entity), None).is_ok());
    }

    #[test]
    fn test_state_guard_rejects_stale_state() {
        let entity = Entity::new(EntityId::new("E1"), OrganizationId::new("org"), "INVOICE", "x")
            .with_state("SUBMITTED");
        let err = check_guards(&guarded_commit(Some("DRAFT")), Some(&entity), None).unwrap_err();
        assert!(matches!(err, WorkflowError::StateMismatch { ref actual, .. } if actual == "SUBMITTED"));
    }

    #[test]
    fn test_state_guard_unset_state() {
        let entity = Entity::new(EntityId::new("E1"), OrganizationId::new("org"), "INVOICE", "x");
        assert!(check_guards(&guarded_commit(None), Some(&entity), None).is_ok());
        assert!(check_guards(&guarded_commit(Some("DRAFT")), Some(&entity), None).is_err());
    }

    #[test]
    fn test_state_guard_missing_entity() {
        let err = check_guards(&guarded_commit(None), None, None).unwrap_err();
        assert!(matches!(err, WorkflowError::EntityNotFound { .. }));
    }
}
