use std::sync::Arc;
use tempfile::TempDir;
use workflow_core::workflow::{DecisionRequest, TransitionOutcome, TransitionRequest};
use workflow_core::{
    Entity, EntityId, FileStore, MemoryStore, OrganizationId, StatusOptions, UserId, WorkflowEngine, WorkflowError,
    WorkflowStore,
};
use workflow_types::{
    ApprovalLevel, ApprovalRule, ApprovalStatus, DecisionKind, HealthStatus, StateDefinition, TransitionDefinition,
    WorkflowConfig,
};

fn org() -> OrganizationId {
    OrganizationId::new("org-1")
}

fn invoice_config() -> WorkflowConfig {
    WorkflowConfig {
        states: vec![
            StateDefinition::new("DRAFT", "Draft").initial(),
            StateDefinition::new("SUBMITTED", "Submitted"),
            StateDefinition::new("APPROVED", "Approved").terminal(),
        ],
        transitions: vec![
            TransitionDefinition::new("DRAFT", "SUBMITTED").with_approvals(1, ["MANAGER"]),
            TransitionDefinition::new("SUBMITTED", "APPROVED").with_approvals(2, ["CFO"]),
            TransitionDefinition::new("SUBMITTED", "DRAFT"),
            TransitionDefinition::new("APPROVED", "DRAFT").with_approvals(3, ["CFO"]).auto_approved(),
        ],
        approval_rules: vec![ApprovalRule {
            name: "invoice sign-off".to_string(),
            entity_types: vec!["INVOICE".to_string()],
            levels: vec![ApprovalLevel {
                level: 1,
                required_approvals: 1,
                approver_roles: vec!["MANAGER".to_string()],
            }],
        }],
        bypass_roles: vec!["ADMIN".to_string()],
        ..Default::default()
    }
}

async fn engine_with_invoice(state: Option<&str>) -> WorkflowEngine<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    seed(&*store, state).await;
    let engine = WorkflowEngine::new(store);
    engine
        .configure(org(), "INVOICE".to_string(), invoice_config(), UserId::new("admin"))
        .await
        .unwrap();
    engine
}

async fn seed(store: &dyn WorkflowStore, state: Option<&str>) {
    let mut entity = Entity::new(EntityId::new("E1"), org(), "INVOICE", "Invoice 1");
    if let Some(state) = state {
        entity = entity.with_state(state);
    }
    store.put_entity(entity).await.unwrap();

    for (user, role) in [("boss", "MANAGER"), ("cfo-1", "CFO"), ("cfo-2", "CFO"), ("root", "ADMIN")] {
        store
            .set_actor_roles(&org(), &UserId::new(user), vec![role.to_string()])
            .await
            .unwrap();
    }
}

fn transition(from: &str, to: &str) -> TransitionRequest {
    TransitionRequest {
        organization_id: org(),
        entity_id: EntityId::new("E1"),
        from_state: from.to_string(),
        to_state: to.to_string(),
        actor: UserId::new("clerk"),
        notes: Some("please review".to_string()),
        approval_data: Some(serde_json::json!({"amount": 1200})),
        force: false,
    }
}

fn decision(approval_request_id: &workflow_core::ApprovalRequestId, actor: &str, kind: DecisionKind) -> DecisionRequest {
    DecisionRequest {
        organization_id: org(),
        approval_request_id: approval_request_id.clone(),
        actor: UserId::new(actor),
        decision: kind,
        notes: None,
    }
}

async fn current_state<S: WorkflowStore + ?Sized>(engine: &WorkflowEngine<S>) -> Option<String> {
    engine
        .store()
        .get_entity(&org(), &EntityId::new("E1"))
        .await
        .unwrap()
        .unwrap()
        .metadata
        .workflow_state
}

fn full_status() -> StatusOptions {
    StatusOptions {
        include_history: true,
        include_pending: true,
    }
}

#[tokio::test]
async fn test_invoice_submission_waits_for_approval() {
    let engine = engine_with_invoice(Some("DRAFT")).await;

    let outcome = engine.request_transition(transition("DRAFT", "SUBMITTED")).await.unwrap();
    let approval_request_id = match outcome {
        TransitionOutcome::PendingApproval { approval_request_id } => approval_request_id,
        other => panic!("expected pending approval, got {:?}", other),
    };

    assert_eq!(current_state(&engine).await.as_deref(), Some("DRAFT"));

    let status = engine.status(&org(), &EntityId::new("E1"), full_status()).await.unwrap();
    let pending = status.pending_approvals.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].approval_request_id, approval_request_id.as_str());
    assert_eq!(pending[0].from_state, "DRAFT");
    assert_eq!(pending[0].to_state, "SUBMITTED");
    assert_eq!(pending[0].rules.len(), 1);
    assert!(status.history.unwrap().is_empty());
}

#[tokio::test]
async fn test_undeclared_transitions_never_mutate() {
    let engine = engine_with_invoice(Some("DRAFT")).await;

    for (from, to) in [("DRAFT", "APPROVED"), ("DRAFT", "DRAFT"), ("APPROVED", "SUBMITTED"), ("DRAFT", "ARCHIVED")] {
        let err = engine.request_transition(transition(from, to)).await.unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition { .. }), "{} -> {}: {}", from, to, err);
    }

    assert_eq!(current_state(&engine).await.as_deref(), Some("DRAFT"));
    assert_eq!(engine.store().audit_record_count().await.unwrap(), 0);
    assert_eq!(engine.store().approval_counts().await.unwrap().total(), 0);
}

#[tokio::test]
async fn test_state_mismatch_is_rejected_without_audit() {
    let engine = engine_with_invoice(Some("APPROVED")).await;

    let err = engine.request_transition(transition("SUBMITTED", "DRAFT")).await.unwrap_err();
    assert!(matches!(err, WorkflowError::StateMismatch { .. }));

    assert_eq!(current_state(&engine).await.as_deref(), Some("APPROVED"));
    assert_eq!(engine.store().audit_record_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_zero_approvals_execute_immediately() {
    let engine = engine_with_invoice(Some("SUBMITTED")).await;

    let outcome = engine.request_transition(transition("SUBMITTED", "DRAFT")).await.unwrap();
    assert!(matches!(outcome, TransitionOutcome::Completed { .. }));

    assert_eq!(current_state(&engine).await.as_deref(), Some("DRAFT"));
    assert_eq!(engine.store().audit_record_count().await.unwrap(), 1);
    assert_eq!(engine.store().approval_counts().await.unwrap().total(), 0);
}

#[tokio::test]
async fn test_auto_approve_executes_immediately() {
    let engine = engine_with_invoice(Some("APPROVED")).await;

    let outcome = engine.request_transition(transition("APPROVED", "DRAFT")).await.unwrap();
    let transition_id = match outcome {
        TransitionOutcome::Completed { transition_id } => transition_id,
        other => panic!("expected completion, got {:?}", other),
    };

    let status = engine.status(&org(), &EntityId::new("E1"), full_status()).await.unwrap();
    let history = status.history.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].audit_id, transition_id.as_str());
    assert_eq!(history[0].approval_data, Some(serde_json::json!({"amount": 1200})));
    assert!(status.pending_approvals.unwrap().is_empty());
    assert_eq!(status.last_changed_by.as_deref(), Some("clerk"));
}

#[tokio::test]
async fn test_entity_without_state_starts_in_initial_state() {
    let engine = engine_with_invoice(None).await;

    let outcome = engine.request_transition(transition("DRAFT", "SUBMITTED")).await.unwrap();
    assert!(matches!(outcome, TransitionOutcome::PendingApproval { .. }));
}

#[tokio::test]
async fn test_force_with_permitted_role_bypasses_approval() {
    let engine = engine_with_invoice(Some("DRAFT")).await;

    for actor in ["boss", "root"] {
        let mut request = transition("DRAFT", "SUBMITTED");
        request.actor = UserId::new(actor);
        request.force = true;

        let outcome = engine.request_transition(request).await.unwrap();
        assert!(matches!(outcome, TransitionOutcome::Completed { .. }));
        assert_eq!(current_state(&engine).await.as_deref(), Some("SUBMITTED"));

        engine.request_transition(transition("SUBMITTED", "DRAFT")).await.unwrap();
    }

    let status = engine.status(&org(), &EntityId::new("E1"), full_status()).await.unwrap();
    let history = status.history.unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history.iter().filter(|h| h.forced).count(), 2);
    assert!(status.pending_approvals.unwrap().is_empty());
}

#[tokio::test]
async fn test_force_without_permitted_role_writes_nothing() {
    let engine = engine_with_invoice(Some("DRAFT")).await;
    let mut request = transition("DRAFT", "SUBMITTED");
    request.force = true;

    let err = engine.request_transition(request).await.unwrap_err();
    assert!(matches!(err, WorkflowError::ForceNotPermitted { .. }));

    assert_eq!(current_state(&engine).await.as_deref(), Some("DRAFT"));
    assert_eq!(engine.store().audit_record_count().await.unwrap(), 0);
    assert_eq!(engine.store().approval_counts().await.unwrap().total(), 0);
}

#[tokio::test]
async fn test_missing_entity_and_missing_config() {
    let engine = engine_with_invoice(Some("DRAFT")).await;

    let mut request = transition("DRAFT", "SUBMITTED");
    request.entity_id = EntityId::new("E404");
    let err = engine.request_transition(request).await.unwrap_err();
    assert!(matches!(err, WorkflowError::EntityNotFound { .. }));

    let contract = Entity::new(EntityId::new("C1"), org(), "CONTRACT", "Contract").with_state("DRAFT");
    engine.store().put_entity(contract).await.unwrap();
    let mut request = transition("DRAFT", "SUBMITTED");
    request.entity_id = EntityId::new("C1");
    let err = engine.request_transition(request).await.unwrap_err();
    assert!(matches!(err, WorkflowError::NotConfigured { ref entity_type } if entity_type == "CONTRACT"));
}

#[tokio::test]
async fn test_newest_config_applies_to_next_request() {
    let engine = engine_with_invoice(Some("DRAFT")).await;

    let mut relaxed = invoice_config();
    relaxed.transitions[0] = TransitionDefinition::new("DRAFT", "SUBMITTED");
    let stored = engine
        .configure(org(), "INVOICE".to_string(), relaxed, UserId::new("admin"))
        .await
        .unwrap();

    let active = engine.active_config(&org(), "INVOICE").await.unwrap();
    assert_eq!(active.config_id, stored.config_id);

    let outcome = engine.request_transition(transition("DRAFT", "SUBMITTED")).await.unwrap();
    assert!(matches!(outcome, TransitionOutcome::Completed { .. }));
}

#[tokio::test]
async fn test_configure_rejects_invalid_config() {
    let engine = engine_with_invoice(Some("DRAFT")).await;
    let before = engine.active_config(&org(), "INVOICE").await.unwrap();

    let mut broken = invoice_config();
    broken.transitions.push(TransitionDefinition::new("APPROVED", "ARCHIVED"));
    let err = engine
        .configure(org(), "INVOICE".to_string(), broken, UserId::new("admin"))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidConfig(ref errors) if errors.len() == 1));

    let after = engine.active_config(&org(), "INVOICE").await.unwrap();
    assert_eq!(after.config_id, before.config_id);

    let err = engine.active_config(&org(), "CONTRACT").await.unwrap_err();
    assert!(matches!(err, WorkflowError::NotConfigured { .. }));
}

#[tokio::test]
async fn test_single_approval_executes_transition() {
    let engine = engine_with_invoice(Some("DRAFT")).await;
    let approval_request_id = match engine.request_transition(transition("DRAFT", "SUBMITTED")).await.unwrap() {
        TransitionOutcome::PendingApproval { approval_request_id } => approval_request_id,
        other => panic!("expected pending approval, got {:?}", other),
    };

    let resolved = engine
        .decide(decision(&approval_request_id, "boss", DecisionKind::Approve))
        .await
        .unwrap();
    assert_eq!(resolved.status, ApprovalStatus::Approved);
    let transition_id = resolved.transition_id.clone().unwrap();

    assert_eq!(current_state(&engine).await.as_deref(), Some("SUBMITTED"));

    let status = engine.status(&org(), &EntityId::new("E1"), full_status()).await.unwrap();
    let history = status.history.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].audit_id, transition_id.as_str());
    assert_eq!(history[0].approval_request_id.as_deref(), Some(approval_request_id.as_str()));
    assert_eq!(history[0].notes.as_deref(), Some("please review"));
    assert!(status.pending_approvals.unwrap().is_empty());

    let err = engine
        .decide(decision(&approval_request_id, "cfo-1", DecisionKind::Approve))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::ApprovalNotPending { .. }));
    assert_eq!(engine.store().audit_record_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_approvals_accumulate_until_required_count() {
    let engine = engine_with_invoice(Some("SUBMITTED")).await;
    let approval_request_id = match engine.request_transition(transition("SUBMITTED", "APPROVED")).await.unwrap() {
        TransitionOutcome::PendingApproval { approval_request_id } => approval_request_id,
        other => panic!("expected pending approval, got {:?}", other),
    };

    let first = engine
        .decide(decision(&approval_request_id, "cfo-1", DecisionKind::Approve))
        .await
        .unwrap();
    assert_eq!(first.status, ApprovalStatus::Pending);
    assert_eq!(first.approvals_received(), 1);
    assert_eq!(current_state(&engine).await.as_deref(), Some("SUBMITTED"));

    let err = engine
        .decide(decision(&approval_request_id, "cfo-1", DecisionKind::Approve))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::DuplicateDecision { .. }));

    let second = engine
        .decide(decision(&approval_request_id, "cfo-2", DecisionKind::Approve))
        .await
        .unwrap();
    assert_eq!(second.status, ApprovalStatus::Approved);
    assert_eq!(current_state(&engine).await.as_deref(), Some("APPROVED"));
    assert_eq!(engine.store().audit_record_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_approver_permissions() {
    let engine = engine_with_invoice(Some("DRAFT")).await;
    let approval_request_id = match engine.request_transition(transition("DRAFT", "SUBMITTED")).await.unwrap() {
        TransitionOutcome::PendingApproval { approval_request_id } => approval_request_id,
        other => panic!("expected pending approval, got {:?}", other),
    };

    // Requester and actors without an eligible role are refused
    for actor in ["clerk", "cfo-1", "stranger"] {
        let err = engine
            .decide(decision(&approval_request_id, actor, DecisionKind::Approve))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::ApproverNotPermitted { .. }), "{}: {}", actor, err);
    }

    let mut other_org = decision(&approval_request_id, "boss", DecisionKind::Approve);
    other_org.organization_id = OrganizationId::new("org-2");
    let err = engine.decide(other_org).await.unwrap_err();
    assert!(matches!(err, WorkflowError::ApprovalNotFound(_)));
}

#[tokio::test]
async fn test_rejection_closes_request_without_transition() {
    let engine = engine_with_invoice(Some("DRAFT")).await;
    let approval_request_id = match engine.request_transition(transition("DRAFT", "SUBMITTED")).await.unwrap() {
        TransitionOutcome::PendingApproval { approval_request_id } => approval_request_id,
        other => panic!("expected pending approval, got {:?}", other),
    };

    let rejected = engine
        .decide(decision(&approval_request_id, "boss", DecisionKind::Reject))
        .await
        .unwrap();
    assert_eq!(rejected.status, ApprovalStatus::Rejected);
    assert!(rejected.transition_id.is_none());

    assert_eq!(current_state(&engine).await.as_deref(), Some("DRAFT"));
    let status = engine.status(&org(), &EntityId::new("E1"), full_status()).await.unwrap();
    assert!(status.pending_approvals.unwrap().is_empty());
    assert!(status.history.unwrap().is_empty());
}

#[tokio::test]
async fn test_approval_after_entity_moved_stays_pending() {
    let engine = engine_with_invoice(Some("DRAFT")).await;
    let approval_request_id = match engine.request_transition(transition("DRAFT", "SUBMITTED")).await.unwrap() {
        TransitionOutcome::PendingApproval { approval_request_id } => approval_request_id,
        other => panic!("expected pending approval, got {:?}", other),
    };

    let mut forced = transition("DRAFT", "SUBMITTED");
    forced.actor = UserId::new("root");
    forced.force = true;
    engine.request_transition(forced).await.unwrap();

    let err = engine
        .decide(decision(&approval_request_id, "boss", DecisionKind::Approve))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::StateMismatch { .. }));

    let request = engine
        .store()
        .get_approval_request(&org(), &approval_request_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(request.status, ApprovalStatus::Pending);
    assert!(request.decisions.is_empty());
    assert_eq!(engine.store().audit_record_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_health_reflects_counts() {
    let engine = engine_with_invoice(Some("DRAFT")).await;
    let health = engine.health().await.unwrap();
    assert_eq!(health.status, HealthStatus::Healthy);
    assert_eq!(health.pending_approvals, 0);

    engine.request_transition(transition("DRAFT", "SUBMITTED")).await.unwrap();
    let health = engine.health().await.unwrap();
    assert_eq!(health.status, HealthStatus::Healthy);
    assert_eq!(health.pending_approvals, 1);
    assert_eq!(health.audit_records, 0);
}

#[tokio::test]
async fn test_file_store_engine_round_trip() {
    let temp_dir = TempDir::new().unwrap();

    let approval_request_id = {
        let store = Arc::new(FileStore::open(temp_dir.path()).unwrap());
        seed(&*store, Some("DRAFT")).await;
        let engine = WorkflowEngine::new(store);
        engine
            .configure(org(), "INVOICE".to_string(), invoice_config(), UserId::new("admin"))
            .await
            .unwrap();

        match engine.request_transition(transition("DRAFT", "SUBMITTED")).await.unwrap() {
            TransitionOutcome::PendingApproval { approval_request_id } => approval_request_id,
            other => panic!("expected pending approval, got {:?}", other),
        }
    };

    // Reopen: config, entity and pending request survive
    let store: Arc<dyn WorkflowStore> = Arc::new(FileStore::open(temp_dir.path()).unwrap());
    let engine = WorkflowEngine::new(store);
    let resolved = engine
        .decide(decision(&approval_request_id, "boss", DecisionKind::Approve))
        .await
        .unwrap();
    assert_eq!(resolved.status, ApprovalStatus::Approved);
    assert_eq!(current_state(&engine).await.as_deref(), Some("SUBMITTED"));

    let status = engine.status(&org(), &EntityId::new("E1"), full_status()).await.unwrap();
    assert_eq!(status.history.unwrap().len(), 1);
    assert!(status.pending_approvals.unwrap().is_empty());
}
