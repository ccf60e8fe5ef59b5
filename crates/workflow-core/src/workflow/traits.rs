//! Storage seam for the workflow engine
//!
//! The engine never writes piecemeal: every state-changing operation is
//! described as one `WorkflowCommit` which the store applies all-or-nothing
//! after checking its guards.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crate::error::Result;
use super::approval_types::{
    ApprovalRequest,
    ApprovalRequestId,
    Entity,
    EntityId,
    OrganizationId,
    Relationship,
    StatusCountMap,
    StoredWorkflowConfig,
    UserId,
    WorkflowAuditRecord,
};

/// Commit only if the entity's stored `workflow_state` still equals
/// `expected_state` (None meaning the entity was never transitioned)
#[derive(Debug, Clone, PartialEq)]
pub struct StateGuard {
    pub entity_id: EntityId,
    pub expected_state: Option<String>,
}

/// Commit only if the approval request is still pending with exactly
/// `expected_decisions` recorded decisions
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalGuard {
    pub approval_request_id: ApprovalRequestId,
    pub expected_decisions: usize,
}

/// Metadata update applied to the target entity by an executed transition
#[derive(Debug, Clone, PartialEq)]
pub struct EntityPatch {
    pub entity_id: EntityId,
    pub workflow_state: String,
    pub changed_at: DateTime<Utc>,
    pub changed_by: UserId,
}

/// A set of writes applied atomically within one organization
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowCommit {
    pub organization_id: OrganizationId,
    pub state_guard: Option<StateGuard>,
    pub approval_guard: Option<ApprovalGuard>,
    pub audit_record: Option<WorkflowAuditRecord>,
    pub entity_patch: Option<EntityPatch>,
    /// Inserted, or replaced when a request with the same id exists
    pub approval_request: Option<ApprovalRequest>,
    pub relationships: Vec<Relationship>,
}

impl WorkflowCommit {
    pub fn new(organization_id: OrganizationId) -> Self {
        Self {
            organization_id,
            state_guard: None,
            approval_guard: None,
            audit_record: None,
            entity_patch: None,
            approval_request: None,
            relationships: Vec::new(),
        }
    }
}

/// Persistence operations required by the workflow engine
///
/// Every read is scoped by organization; records of other organizations are
/// invisible. Linked-record reads return records in insertion order.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Load an entity from the entity store
    async fn get_entity(&self, organization_id: &OrganizationId, entity_id: &EntityId) -> Result<Option<Entity>>;

    /// Insert or replace an entity in the entity store
    async fn put_entity(&self, entity: Entity) -> Result<()>;

    /// Roles the actor holds within the organization
    async fn actor_roles(&self, organization_id: &OrganizationId, user_id: &UserId) -> Result<Vec<String>>;

    /// Replace the actor's roles within the organization
    async fn set_actor_roles(&self, organization_id: &OrganizationId, user_id: &UserId, roles: Vec<String>) -> Result<()>;

    /// Newest stored config for the entity type, by creation time
    async fn latest_config(&self, organization_id: &OrganizationId, entity_type: &str) -> Result<Option<StoredWorkflowConfig>>;

    /// Store a new config version. Earlier versions are kept.
    async fn save_config(&self, config: StoredWorkflowConfig) -> Result<()>;

    async fn get_approval_request(
        &self,
        organization_id: &OrganizationId,
        approval_request_id: &ApprovalRequestId,
    ) -> Result<Option<ApprovalRequest>>;

    /// Audit records linked to the entity through `WORKFLOW_AUDIT`
    async fn linked_audit_records(&self, organization_id: &OrganizationId, entity_id: &EntityId) -> Result<Vec<WorkflowAuditRecord>>;

    /// Approval requests linked to the entity through `REQUIRES_APPROVAL`
    async fn linked_approval_requests(&self, organization_id: &OrganizationId, entity_id: &EntityId) -> Result<Vec<ApprovalRequest>>;

    /// Apply every write of the commit, or none of them
    async fn commit(&self, commit: WorkflowCommit) -> Result<()>;

    /// Approval request counts per status across all organizations
    async fn approval_counts(&self) -> Result<StatusCountMap>;

    /// Number of audit records across all organizations
    async fn audit_record_count(&self) -> Result<usize>;
}
