//! Approval gating for validated transitions

use chrono::{DateTime, Utc};
use serde_json::Value;
use workflow_types::{ApprovalRule, ApprovalStatus, TransitionDefinition, WorkflowConfig};

use crate::constants::REQUIRES_APPROVAL;
use crate::error::{Result, WorkflowError};
use super::approval_types::{ApprovalRequest, ApprovalRequestId, Entity, Relationship, UserId};
use super::traits::{StateGuard, WorkflowCommit, WorkflowStore};

/// Outcome of gating a transition
#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalRequirement {
    NotRequired,
    Required { rules: Vec<ApprovalRule> },
}

impl ApprovalRequirement {
    pub fn is_required(&self) -> bool {
        matches!(self, Self::Required { .. })
    }
}

/// Decide whether the transition must wait for sign-off.
///
/// Candidate rules are every config rule listing the entity's type.
pub fn evaluate(
    config: &WorkflowConfig,
    transition: Option<&TransitionDefinition>,
    entity_type: &str,
) -> ApprovalRequirement {
    match transition {
        None => ApprovalRequirement::NotRequired,
        Some(t) if t.auto_approve => ApprovalRequirement::NotRequired,
        Some(t) if t.required_approvals > 0 => ApprovalRequirement::Required {
            rules: config.rules_for(entity_type),
        },
        Some(_) => ApprovalRequirement::NotRequired,
    }
}

/// Roles that allow an actor to skip approval for this transition
pub fn bypass_roles<'a>(config: &'a WorkflowConfig, transition: &'a TransitionDefinition) -> Vec<&'a str> {
    transition
        .approval_roles
        .iter()
        .chain(config.bypass_roles.iter())
        .map(String::as_str)
        .collect()
}

/// Confirm the actor holds a role that permits forcing the transition
pub async fn authorize_force<S: WorkflowStore + ?Sized>(
    store: &S,
    config: &WorkflowConfig,
    transition: &TransitionDefinition,
    entity: &Entity,
    actor: &UserId,
) -> Result<()> {
    let allowed = bypass_roles(config, transition);
    let held = store.actor_roles(&entity.organization_id, actor).await?;

    if held.iter().any(|role| allowed.contains(&role.as_str())) {
        log::info!(
            "Actor {} forced {} -> {} on entity {}",
            actor, transition.from_state, transition.to_state, entity.id
        );
        return Ok(());
    }

    log::warn!(
        "Actor {} attempted to force {} -> {} on entity {} without a permitted role",
        actor, transition.from_state, transition.to_state, entity.id
    );
    Err(WorkflowError::ForceNotPermitted { actor: actor.to_string() })
}

/// Caller-supplied context carried on a new approval request
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub notes: Option<String>,
    pub approval_data: Option<Value>,
}

/// Build the commit that opens an approval request and links it to the entity.
///
/// The entity's state is not touched, but the commit still refuses to land if
/// the entity moved after validation.
pub fn open_request(
    entity: &Entity,
    transition: &TransitionDefinition,
    rules: Vec<ApprovalRule>,
    requested_by: &UserId,
    context: RequestContext,
    now: DateTime<Utc>,
) -> (ApprovalRequestId, WorkflowCommit) {
    let request = ApprovalRequest {
        id: ApprovalRequestId::generate(),
        organization_id: entity.organization_id.clone(),
        entity_id: entity.id.clone(),
        entity_type: entity.entity_type.clone(),
        from_state: transition.from_state.clone(),
        to_state: transition.to_state.clone(),
        requested_by: requested_by.clone(),
        rules,
        required_approvals: transition.required_approvals,
        approval_roles: transition.approval_roles.clone(),
        notes: context.notes,
        approval_data: context.approval_data,
        status: ApprovalStatus::Pending,
        decisions: Vec::new(),
        transition_id: None,
        created_at: now,
        resolved_at: None,
    };
    let request_id = request.id.clone();

    let mut commit = WorkflowCommit::new(entity.organization_id.clone());
    commit.state_guard = Some(StateGuard {
        entity_id: entity.id.clone(),
        expected_state: entity.metadata.workflow_state.clone(),
    });
    commit.relationships.push(Relationship::link(
        entity.organization_id.clone(),
        entity.id.clone(),
        request_id.as_str(),
        REQUIRES_APPROVAL,
        now,
    ));
    commit.approval_request = Some(request);

    (request_id, commit)
}
