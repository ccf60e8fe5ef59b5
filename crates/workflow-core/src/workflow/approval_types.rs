//! Strongly typed workflow records
//! Entities, approval requests, audit records and the edges between them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use workflow_types::{ApprovalRule, ApprovalStatus, DecisionKind, WorkflowConfig};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        string_id!($(#[$meta])* $name);

        impl $name {
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn from_string(s: &str) -> Result<Self, String> {
                uuid::Uuid::parse_str(s)
                    .map(|_| Self(s.to_string()))
                    .map_err(|e| format!("Invalid {} format: {}", stringify!($name), e))
            }
        }
    };
}

string_id!(
    /// Identifier of a business entity in the external entity store
    EntityId
);
string_id!(
    /// Tenant scope for every record
    OrganizationId
);
string_id!(
    /// Identifier of the user performing an action
    UserId
);
uuid_id!(
    /// Identifier of an approval request
    ApprovalRequestId
);
uuid_id!(
    /// Identifier of an audit record, returned to callers as the transition id
    AuditId
);
uuid_id!(
    /// Identifier of one stored version of a workflow config
    ConfigId
);
uuid_id!(RelationshipId);

/// Workflow bookkeeping kept in an entity's metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_state_change: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_changed_by: Option<UserId>,
    /// Everything else the entity store keeps in metadata
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Business object owned by the entity store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub organization_id: OrganizationId,
    pub entity_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub metadata: EntityMetadata,
}

impl Entity {
    pub fn new(
        id: EntityId,
        organization_id: OrganizationId,
        entity_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            organization_id,
            entity_type: entity_type.into(),
            name: name.into(),
            metadata: EntityMetadata::default(),
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.metadata.workflow_state = Some(state.into());
        self
    }

    /// State the workflow engine should treat as current. Entities that were
    /// never transitioned sit in the config's initial state.
    pub fn current_state<'a>(&'a self, config: &'a WorkflowConfig) -> Option<&'a str> {
        self.metadata
            .workflow_state
            .as_deref()
            .or_else(|| config.initial_state().map(|s| s.code.as_str()))
    }
}

/// One stored version of a workflow config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredWorkflowConfig {
    pub config_id: ConfigId,
    pub organization_id: OrganizationId,
    pub entity_type: String,
    pub config: WorkflowConfig,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// A single approver's decision on a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub approver: UserId,
    pub decision: DecisionKind,
    pub notes: Option<String>,
    pub decided_at: DateTime<Utc>,
}

/// Pending sign-off for one proposed transition on one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: ApprovalRequestId,
    pub organization_id: OrganizationId,
    pub entity_id: EntityId,
    pub entity_type: String,
    pub from_state: String,
    pub to_state: String,
    pub requested_by: UserId,
    pub rules: Vec<ApprovalRule>,
    pub required_approvals: u32,
    pub approval_roles: Vec<String>,
    pub notes: Option<String>,
    pub approval_data: Option<Value>,
    pub status: ApprovalStatus,
    #[serde(default)]
    pub decisions: Vec<ApprovalDecision>,
    pub transition_id: Option<AuditId>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ApprovalRequest {
    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }

    pub fn approvals_received(&self) -> u32 {
        self.decisions
            .iter()
            .filter(|d| d.decision == DecisionKind::Approve)
            .count() as u32
    }

    pub fn has_decided(&self, actor: &UserId) -> bool {
        self.decisions.iter().any(|d| &d.approver == actor)
    }

    /// Roles that may decide this request: the transition's approval roles
    /// plus every approver role of the denormalized rules
    pub fn eligible_roles(&self) -> Vec<String> {
        let mut roles: Vec<String> = self.approval_roles.clone();
        for level in self.rules.iter().flat_map(|r| r.levels.iter()) {
            roles.extend(level.approver_roles.iter().cloned());
        }
        roles.sort();
        roles.dedup();
        roles
    }

    pub fn record_decision(&mut self, decision: ApprovalDecision) {
        self.decisions.push(decision);
    }

    pub fn mark_approved(&mut self, transition_id: AuditId, at: DateTime<Utc>) {
        self.status = ApprovalStatus::Approved;
        self.transition_id = Some(transition_id);
        self.resolved_at = Some(at);
    }

    pub fn mark_rejected(&mut self, at: DateTime<Utc>) {
        self.status = ApprovalStatus::Rejected;
        self.resolved_at = Some(at);
    }
}

/// Immutable log entry of one executed transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowAuditRecord {
    pub id: AuditId,
    pub organization_id: OrganizationId,
    pub entity_id: EntityId,
    pub from_state: String,
    pub to_state: String,
    pub changed_by: UserId,
    pub notes: Option<String>,
    pub approval_data: Option<Value>,
    pub approval_request_id: Option<ApprovalRequestId>,
    #[serde(default)]
    pub forced: bool,
    pub created_at: DateTime<Utc>,
}

/// Typed directed edge from an entity to a workflow record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: RelationshipId,
    pub organization_id: OrganizationId,
    pub from_entity_id: EntityId,
    pub to_entity_id: String,
    pub relationship_type: String,
    pub created_at: DateTime<Utc>,
}

impl Relationship {
    pub fn link(
        organization_id: OrganizationId,
        from_entity_id: EntityId,
        to_entity_id: impl Into<String>,
        relationship_type: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RelationshipId::generate(),
            organization_id,
            from_entity_id,
            to_entity_id: to_entity_id.into(),
            relationship_type: relationship_type.to_string(),
            created_at,
        }
    }
}

/// Approval request counts per status
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusCountMap {
    counts: HashMap<ApprovalStatus, usize>,
}

impl StatusCountMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, status: ApprovalStatus) {
        *self.counts.entry(status).or_insert(0) += 1;
    }

    pub fn get(&self, status: ApprovalStatus) -> usize {
        self.counts.get(&status).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

/// Sort newest first. Records with equal timestamps keep reverse insertion
/// order, so the slice must arrive oldest-inserted first.
pub(crate) fn newest_first<T>(records: &mut Vec<T>, created_at: impl Fn(&T) -> DateTime<Utc>) {
    records.reverse();
    records.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
}
