//! Workflow definition types
//!
//! A `WorkflowConfig` describes the state machine for one entity type
//! inside one organization: its states, the legal transitions between them
//! and the approval rules that gate those transitions.

use serde::{Deserialize, Serialize};

/// A declared workflow state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDefinition {
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_initial: bool,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub required_permissions: Vec<String>,
}

impl StateDefinition {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            is_initial: false,
            is_final: false,
            required_permissions: Vec::new(),
        }
    }

    pub fn initial(mut self) -> Self {
        self.is_initial = true;
        self
    }

    pub fn terminal(mut self) -> Self {
        self.is_final = true;
        self
    }
}

/// A legal move between two declared states
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionDefinition {
    pub from_state: String,
    pub to_state: String,
    #[serde(default)]
    pub required_approvals: u32,
    #[serde(default)]
    pub approval_roles: Vec<String>,
    #[serde(default)]
    pub auto_approve: bool,
}

impl TransitionDefinition {
    pub fn new(from_state: impl Into<String>, to_state: impl Into<String>) -> Self {
        Self {
            from_state: from_state.into(),
            to_state: to_state.into(),
            required_approvals: 0,
            approval_roles: Vec::new(),
            auto_approve: false,
        }
    }

    /// Require `count` approvals from actors holding one of `roles`
    pub fn with_approvals<I, S>(mut self, count: u32, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_approvals = count;
        self.approval_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn auto_approved(mut self) -> Self {
        self.auto_approve = true;
        self
    }

    /// Whether this transition connects exactly `from` and `to`
    pub fn connects(&self, from: &str, to: &str) -> bool {
        self.from_state == from && self.to_state == to
    }
}

/// One level of an approval rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalLevel {
    pub level: u32,
    #[serde(default)]
    pub required_approvals: u32,
    #[serde(default)]
    pub approver_roles: Vec<String>,
}

/// Approval rule applying to a set of entity types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRule {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub entity_types: Vec<String>,
    #[serde(default)]
    pub levels: Vec<ApprovalLevel>,
}

impl ApprovalRule {
    pub fn applies_to(&self, entity_type: &str) -> bool {
        self.entity_types.iter().any(|t| t == entity_type)
    }
}

/// Escalation declaration. Stored with the config; nothing schedules it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationRule {
    pub state: String,
    pub after_hours: u32,
    #[serde(default)]
    pub escalate_to_roles: Vec<String>,
}

/// Notification declaration. Stored with the config; nothing delivers it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRule {
    pub on_state: String,
    #[serde(default)]
    pub notify_roles: Vec<String>,
    #[serde(default)]
    pub channel: Option<String>,
}

/// Complete state machine definition for one entity type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub states: Vec<StateDefinition>,
    #[serde(default)]
    pub transitions: Vec<TransitionDefinition>,
    #[serde(default)]
    pub approval_rules: Vec<ApprovalRule>,
    #[serde(default)]
    pub escalation_rules: Vec<EscalationRule>,
    #[serde(default)]
    pub notification_rules: Vec<NotificationRule>,
    /// Roles allowed to force a transition past its approval gate
    #[serde(default)]
    pub bypass_roles: Vec<String>,
}

impl WorkflowConfig {
    /// Exact `(from, to)` lookup. There are no wildcard transitions.
    pub fn find_transition(&self, from: &str, to: &str) -> Option<&TransitionDefinition> {
        self.transitions.iter().find(|t| t.connects(from, to))
    }

    pub fn initial_state(&self) -> Option<&StateDefinition> {
        self.states.iter().find(|s| s.is_initial)
    }

    /// Approval rules whose entity type list contains `entity_type`
    pub fn rules_for(&self, entity_type: &str) -> Vec<ApprovalRule> {
        self.approval_rules
            .iter()
            .filter(|r| r.applies_to(entity_type))
            .cloned()
            .collect()
    }
}
