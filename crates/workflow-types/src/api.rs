//! HTTP request and response bodies for the workflow API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::definition::{ApprovalRule, WorkflowConfig};

/// Treats absent and empty strings alike
fn is_blank(field: &Option<String>) -> bool {
    field.as_deref().map_or(true, |s| s.trim().is_empty())
}

/// Parses the loose boolean flags accepted on query strings
pub fn parse_flag(value: Option<&str>) -> bool {
    matches!(value.map(str::trim), Some("true") | Some("1") | Some("yes"))
}

/// Body of `POST /workflows`
///
/// Every field is optional at the wire level so the handler can report all
/// missing fields at once instead of failing on the first.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransitionRequestBody {
    pub entity_id: Option<String>,
    pub organization_id: Option<String>,
    pub from_state: Option<String>,
    pub to_state: Option<String>,
    pub actor_user_id: Option<String>,
    pub notes: Option<String>,
    pub approval_data: Option<Value>,
    #[serde(default)]
    pub force_transition: Option<bool>,
}

impl TransitionRequestBody {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if is_blank(&self.entity_id) {
            missing.push("entity_id");
        }
        if is_blank(&self.organization_id) {
            missing.push("organization_id");
        }
        if is_blank(&self.from_state) {
            missing.push("from_state");
        }
        if is_blank(&self.to_state) {
            missing.push("to_state");
        }
        if is_blank(&self.actor_user_id) {
            missing.push("actor_user_id");
        }
        missing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionStatus {
    Completed,
    PendingApproval,
}

/// Response of `POST /workflows`. `transition_id` stays null while the
/// transition waits for approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionResponse {
    pub transition_id: Option<String>,
    pub status: TransitionStatus,
    pub approval_required: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub approval_request_id: Option<String>,
}

/// Body of `PUT /workflows`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigureWorkflowBody {
    pub organization_id: Option<String>,
    pub entity_type: Option<String>,
    pub workflow_config: Option<Value>,
    pub actor_user_id: Option<String>,
}

impl ConfigureWorkflowBody {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if is_blank(&self.organization_id) {
            missing.push("organization_id");
        }
        if is_blank(&self.entity_type) {
            missing.push("entity_type");
        }
        if self.workflow_config.as_ref().map_or(true, Value::is_null) {
            missing.push("workflow_config");
        }
        if is_blank(&self.actor_user_id) {
            missing.push("actor_user_id");
        }
        missing
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigureWorkflowResponse {
    pub config_id: String,
    pub organization_id: String,
    pub entity_type: String,
    pub created_at: DateTime<Utc>,
}

/// Query of `GET /workflows/config`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigQuery {
    pub organization_id: Option<String>,
    pub entity_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveConfigResponse {
    pub config_id: String,
    pub organization_id: String,
    pub entity_type: String,
    pub workflow_config: WorkflowConfig,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Query of `GET /workflows`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusQuery {
    pub entity_id: Option<String>,
    pub organization_id: Option<String>,
    pub include_history: Option<String>,
    pub include_pending: Option<String>,
}

impl StatusQuery {
    pub fn missing_params(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if is_blank(&self.entity_id) {
            missing.push("entity_id");
        }
        if is_blank(&self.organization_id) {
            missing.push("organization_id");
        }
        missing
    }

    pub fn wants_history(&self) -> bool {
        parse_flag(self.include_history.as_deref())
    }

    pub fn wants_pending(&self) -> bool {
        parse_flag(self.include_pending.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub audit_id: String,
    pub from_state: String,
    pub to_state: String,
    pub changed_by: String,
    pub notes: Option<String>,
    pub approval_data: Option<Value>,
    pub approval_request_id: Option<String>,
    pub forced: bool,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingApprovalEntry {
    pub approval_request_id: String,
    pub from_state: String,
    pub to_state: String,
    pub requested_by: String,
    pub notes: Option<String>,
    pub approval_data: Option<Value>,
    pub required_approvals: u32,
    pub approvals_received: u32,
    pub approval_roles: Vec<String>,
    pub rules: Vec<ApprovalRule>,
    pub requested_at: DateTime<Utc>,
}

/// Response of `GET /workflows`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStatusResponse {
    pub entity_id: String,
    pub entity_type: String,
    pub entity_name: String,
    pub current_state: Option<String>,
    pub last_state_change: Option<DateTime<Utc>>,
    pub last_changed_by: Option<String>,
    pub assigned_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub history: Option<Vec<HistoryEntry>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pending_approvals: Option<Vec<PendingApprovalEntry>>,
}

/// Lifecycle of an approval request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Approve,
    Reject,
}

impl DecisionKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "approve" | "approved" => Some(Self::Approve),
            "reject" | "rejected" => Some(Self::Reject),
            _ => None,
        }
    }
}

/// Body of `POST /workflows/approvals/{approval_id}/decision`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DecisionBody {
    pub organization_id: Option<String>,
    pub actor_user_id: Option<String>,
    pub decision: Option<String>,
    pub notes: Option<String>,
}

impl DecisionBody {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if is_blank(&self.organization_id) {
            missing.push("organization_id");
        }
        if is_blank(&self.actor_user_id) {
            missing.push("actor_user_id");
        }
        if is_blank(&self.decision) {
            missing.push("decision");
        }
        missing
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionResponse {
    pub approval_request_id: String,
    pub status: ApprovalStatus,
    pub approvals_received: u32,
    pub required_approvals: u32,
    pub transition_id: Option<String>,
}

/// Overall service health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub pending_approvals: usize,
    pub approved_approvals: usize,
    pub rejected_approvals: usize,
    pub audit_records: usize,
    pub checked_at: DateTime<Utc>,
}

/// Uniform error body. `details` carries field lists and validation errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details: Option<Value>,
}
