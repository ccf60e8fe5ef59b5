//! Workflow engine: one entry point per workflow operation

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use workflow_types::api::{HealthResponse, WorkflowStatusResponse};
use workflow_types::{ApprovalStatus, DecisionKind, HealthStatus, WorkflowConfig};

use crate::constants::{PENDING_APPROVALS_DEGRADED_THRESHOLD, REJECTED_APPROVALS_UNHEALTHY_THRESHOLD};
use crate::error::{Result, WorkflowError};
use super::approval_gate::{self, ApprovalRequirement, RequestContext};
use super::approval_types::{
    ApprovalDecision,
    ApprovalRequest,
    ApprovalRequestId,
    AuditId,
    ConfigId,
    EntityId,
    OrganizationId,
    StoredWorkflowConfig,
    UserId,
};
use super::config_validator::validate_workflow_config;
use super::executor::{self, TransitionExecution};
use super::query::{self, StatusOptions};
use super::resolver::resolve_config;
use super::traits::{ApprovalGuard, WorkflowCommit, WorkflowStore};
use super::validator::validate_transition;

/// A caller's request to move an entity between states
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub organization_id: OrganizationId,
    pub entity_id: EntityId,
    pub from_state: String,
    pub to_state: String,
    pub actor: UserId,
    pub notes: Option<String>,
    pub approval_data: Option<Value>,
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    Completed { transition_id: AuditId },
    PendingApproval { approval_request_id: ApprovalRequestId },
}

/// An approver's decision on a pending request
#[derive(Debug, Clone)]
pub struct DecisionRequest {
    pub organization_id: OrganizationId,
    pub approval_request_id: ApprovalRequestId,
    pub actor: UserId,
    pub decision: DecisionKind,
    pub notes: Option<String>,
}

/// Workflow engine over a store
pub struct WorkflowEngine<S: WorkflowStore + ?Sized> {
    store: Arc<S>,
}

impl<S: WorkflowStore + ?Sized> Clone for WorkflowEngine<S> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store) }
    }
}

impl<S: WorkflowStore + ?Sized> WorkflowEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validate a transition and either execute it or open an approval request
    pub async fn request_transition(&self, request: TransitionRequest) -> Result<TransitionOutcome> {
        log::info!(
            "Transition requested for entity {} in {}: {} -> {} by {}",
            request.entity_id, request.organization_id, request.from_state, request.to_state, request.actor
        );

        let entity = self
            .store
            .get_entity(&request.organization_id, &request.entity_id)
            .await?
            .ok_or_else(|| WorkflowError::EntityNotFound {
                entity_id: request.entity_id.to_string(),
                organization_id: request.organization_id.to_string(),
            })?;

        let stored = resolve_config(self.store(), &request.organization_id, &entity.entity_type)
            .await?
            .ok_or_else(|| WorkflowError::NotConfigured {
                entity_type: entity.entity_type.clone(),
            })?;
        let config = &stored.config;

        let transition = validate_transition(config, &request.from_state, &request.to_state, &entity)?;

        let requirement = approval_gate::evaluate(config, Some(transition), &entity.entity_type);
        let forced = match (&requirement, request.force) {
            (ApprovalRequirement::Required { .. }, true) => {
                approval_gate::authorize_force(self.store(), config, transition, &entity, &request.actor)
                    .await?;
                true
            }
            _ => false,
        };

        if let (ApprovalRequirement::Required { rules }, false) = (requirement, forced) {
            let context = RequestContext {
                notes: request.notes,
                approval_data: request.approval_data,
            };
            let (approval_request_id, commit) =
                approval_gate::open_request(&entity, transition, rules, &request.actor, context, Utc::now());
            self.store.commit(commit).await?;

            log::info!(
                "Approval request {} opened for entity {} ({} -> {})",
                approval_request_id, entity.id, transition.from_state, transition.to_state
            );
            return Ok(TransitionOutcome::PendingApproval { approval_request_id });
        }

        let execution = TransitionExecution {
            from_state: transition.from_state.clone(),
            to_state: transition.to_state.clone(),
            actor: request.actor,
            notes: request.notes,
            approval_data: request.approval_data,
            approval_request_id: None,
            forced,
        };
        let transition_id = executor::execute(self.store(), &entity, execution).await?;
        Ok(TransitionOutcome::Completed { transition_id })
    }

    /// Validate and store a new config version for the entity type
    pub async fn configure(
        &self,
        organization_id: OrganizationId,
        entity_type: String,
        config: WorkflowConfig,
        actor: UserId,
    ) -> Result<StoredWorkflowConfig> {
        let errors = validate_workflow_config(&config);
        if !errors.is_empty() {
            log::warn!(
                "Rejected workflow config for {}/{}: {}",
                organization_id, entity_type, errors.join("; ")
            );
            return Err(WorkflowError::InvalidConfig(errors));
        }

        let stored = StoredWorkflowConfig {
            config_id: ConfigId::generate(),
            organization_id,
            entity_type,
            config,
            created_by: actor,
            created_at: Utc::now(),
        };
        self.store.save_config(stored.clone()).await?;

        log::info!(
            "Stored workflow config {} for {}/{} ({} states, {} transitions)",
            stored.config_id,
            stored.organization_id,
            stored.entity_type,
            stored.config.states.len(),
            stored.config.transitions.len()
        );
        Ok(stored)
    }

    /// The config currently in force for the entity type
    pub async fn active_config(&self, organization_id: &OrganizationId, entity_type: &str) -> Result<StoredWorkflowConfig> {
        resolve_config(self.store(), organization_id, entity_type)
            .await?
            .ok_or_else(|| WorkflowError::NotConfigured {
                entity_type: entity_type.to_string(),
            })
    }

    pub async fn status(
        &self,
        organization_id: &OrganizationId,
        entity_id: &EntityId,
        options: StatusOptions,
    ) -> Result<WorkflowStatusResponse> {
        query::entity_status(self.store(), organization_id, entity_id, options).await
    }

    /// Record an approver's decision. The approval that reaches the required
    /// count executes the transition in the same commit.
    pub async fn decide(&self, request: DecisionRequest) -> Result<ApprovalRequest> {
        let mut approval = self
            .store
            .get_approval_request(&request.organization_id, &request.approval_request_id)
            .await?
            .ok_or_else(|| WorkflowError::ApprovalNotFound(request.approval_request_id.to_string()))?;

        if !approval.is_pending() {
            return Err(WorkflowError::ApprovalNotPending {
                id: approval.id.to_string(),
                status: approval.status.as_str().to_string(),
            });
        }
        self.authorize_approver(&approval, &request.actor).await?;

        let now = Utc::now();
        let guard = ApprovalGuard {
            approval_request_id: approval.id.clone(),
            expected_decisions: approval.decisions.len(),
        };
        approval.record_decision(ApprovalDecision {
            approver: request.actor.clone(),
            decision: request.decision,
            notes: request.notes.clone(),
            decided_at: now,
        });

        let mut commit = match request.decision {
            DecisionKind::Reject => {
                approval.mark_rejected(now);
                WorkflowCommit::new(request.organization_id.clone())
            }
            DecisionKind::Approve if approval.approvals_received() >= approval.required_approvals => {
                let (transition_id, commit) = self.approved_transition(&approval, &request).await?;
                approval.mark_approved(transition_id, now);
                commit
            }
            DecisionKind::Approve => WorkflowCommit::new(request.organization_id.clone()),
        };
        commit.approval_guard = Some(guard);
        commit.approval_request = Some(approval.clone());
        self.store.commit(commit).await?;

        log::info!(
            "Actor {} decided {:?} on approval request {} ({}/{} approvals, now {})",
            request.actor,
            request.decision,
            approval.id,
            approval.approvals_received(),
            approval.required_approvals,
            approval.status.as_str()
        );
        Ok(approval)
    }

    async fn authorize_approver(&self, approval: &ApprovalRequest, actor: &UserId) -> Result<()> {
        if &approval.requested_by == actor {
            return Err(WorkflowError::ApproverNotPermitted { actor: actor.to_string() });
        }

        let eligible = approval.eligible_roles();
        if !eligible.is_empty() {
            let held = self.store.actor_roles(&approval.organization_id, actor).await?;
            if !held.iter().any(|role| eligible.contains(role)) {
                return Err(WorkflowError::ApproverNotPermitted { actor: actor.to_string() });
            }
        }

        if approval.has_decided(actor) {
            return Err(WorkflowError::DuplicateDecision { actor: actor.to_string() });
        }
        Ok(())
    }

    /// Build the execution commit for a request that just collected its last
    /// approval, re-validating against the entity and config as they are now
    async fn approved_transition(
        &self,
        approval: &ApprovalRequest,
        request: &DecisionRequest,
    ) -> Result<(AuditId, WorkflowCommit)> {
        let entity = self
            .store
            .get_entity(&approval.organization_id, &approval.entity_id)
            .await?
            .ok_or_else(|| WorkflowError::EntityNotFound {
                entity_id: approval.entity_id.to_string(),
                organization_id: approval.organization_id.to_string(),
            })?;

        let stored = resolve_config(self.store(), &approval.organization_id, &approval.entity_type)
            .await?
            .ok_or_else(|| WorkflowError::NotConfigured {
                entity_type: approval.entity_type.clone(),
            })?;
        let transition = validate_transition(&stored.config, &approval.from_state, &approval.to_state, &entity)?;

        let execution = TransitionExecution {
            from_state: transition.from_state.clone(),
            to_state: transition.to_state.clone(),
            actor: request.actor.clone(),
            notes: approval.notes.clone(),
            approval_data: approval.approval_data.clone(),
            approval_request_id: Some(approval.id.clone()),
            forced: false,
        };
        Ok(execution.into_commit(&entity, Utc::now()))
    }

    /// Approval and audit counts with a derived health status
    pub async fn health(&self) -> Result<HealthResponse> {
        let counts = self.store.approval_counts().await?;
        let audit_records = self.store.audit_record_count().await?;

        let pending = counts.get(ApprovalStatus::Pending);
        let rejected = counts.get(ApprovalStatus::Rejected);
        let status = if counts.total() == 0 {
            HealthStatus::Healthy
        } else if rejected > REJECTED_APPROVALS_UNHEALTHY_THRESHOLD {
            HealthStatus::Unhealthy
        } else if pending > PENDING_APPROVALS_DEGRADED_THRESHOLD {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        Ok(HealthResponse {
            status,
            pending_approvals: pending,
            approved_approvals: counts.get(ApprovalStatus::Approved),
            rejected_approvals: rejected,
            audit_records,
            checked_at: Utc::now(),
        })
    }
}
