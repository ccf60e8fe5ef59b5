//! HTTP handlers for the workflow API

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::de::DeserializeOwned;
use workflow_core::workflow::config_validator::parse_workflow_config;
use workflow_core::workflow::{DecisionRequest, TransitionOutcome, TransitionRequest};
use workflow_core::{ApprovalRequestId, EntityId, OrganizationId, StatusOptions, UserId, WorkflowError};
use workflow_types::api::{
    ActiveConfigResponse,
    ConfigQuery,
    ConfigureWorkflowBody,
    ConfigureWorkflowResponse,
    DecisionBody,
    DecisionResponse,
    HealthResponse,
    StatusQuery,
    TransitionRequestBody,
    TransitionResponse,
    TransitionStatus,
    WorkflowStatusResponse,
};
use workflow_types::DecisionKind;

use crate::error::ApiError;
use crate::AppState;

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::InvalidJson(e.to_string()))
}

/// Required fields were checked non-blank before this is called
fn required(value: Option<String>) -> String {
    value.unwrap_or_default()
}

/// POST /workflows
pub async fn request_transition(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TransitionResponse>, ApiError> {
    let body: TransitionRequestBody = parse_body(&body)?;
    let missing = body.missing_fields();
    if !missing.is_empty() {
        return Err(ApiError::MissingFields(missing));
    }

    let request = TransitionRequest {
        organization_id: OrganizationId::new(required(body.organization_id)),
        entity_id: EntityId::new(required(body.entity_id)),
        from_state: required(body.from_state),
        to_state: required(body.to_state),
        actor: UserId::new(required(body.actor_user_id)),
        notes: body.notes,
        approval_data: body.approval_data,
        force: body.force_transition.unwrap_or(false),
    };

    let response = match state.engine.request_transition(request).await? {
        TransitionOutcome::Completed { transition_id } => TransitionResponse {
            transition_id: Some(transition_id.to_string()),
            status: TransitionStatus::Completed,
            approval_required: false,
            approval_request_id: None,
        },
        TransitionOutcome::PendingApproval { approval_request_id } => TransitionResponse {
            transition_id: None,
            status: TransitionStatus::PendingApproval,
            approval_required: true,
            approval_request_id: Some(approval_request_id.to_string()),
        },
    };
    Ok(Json(response))
}

/// PUT /workflows
pub async fn configure_workflow(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<ConfigureWorkflowResponse>), ApiError> {
    let body: ConfigureWorkflowBody = parse_body(&body)?;
    let missing = body.missing_fields();
    if !missing.is_empty() {
        return Err(ApiError::MissingFields(missing));
    }

    let config = parse_workflow_config(body.workflow_config.unwrap_or_default())?;
    let stored = state
        .engine
        .configure(
            OrganizationId::new(required(body.organization_id)),
            required(body.entity_type),
            config,
            UserId::new(required(body.actor_user_id)),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ConfigureWorkflowResponse {
            config_id: stored.config_id.to_string(),
            organization_id: stored.organization_id.to_string(),
            entity_type: stored.entity_type,
            created_at: stored.created_at,
        }),
    ))
}

/// GET /workflows
pub async fn workflow_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<WorkflowStatusResponse>, ApiError> {
    let missing = query.missing_params();
    if !missing.is_empty() {
        return Err(ApiError::MissingParams(missing));
    }

    let options = StatusOptions {
        include_history: query.wants_history(),
        include_pending: query.wants_pending(),
    };
    let status = state
        .engine
        .status(
            &OrganizationId::new(required(query.organization_id)),
            &EntityId::new(required(query.entity_id)),
            options,
        )
        .await?;
    Ok(Json(status))
}

/// GET /workflows/config
pub async fn active_config(
    State(state): State<AppState>,
    Query(query): Query<ConfigQuery>,
) -> Result<Json<ActiveConfigResponse>, ApiError> {
    let mut missing = Vec::new();
    if query.organization_id.as_deref().map_or(true, |s| s.trim().is_empty()) {
        missing.push("organization_id");
    }
    if query.entity_type.as_deref().map_or(true, |s| s.trim().is_empty()) {
        missing.push("entity_type");
    }
    if !missing.is_empty() {
        return Err(ApiError::MissingParams(missing));
    }

    let stored = state
        .engine
        .active_config(&OrganizationId::new(required(query.organization_id)), &required(query.entity_type))
        .await?;

    Ok(Json(ActiveConfigResponse {
        config_id: stored.config_id.to_string(),
        organization_id: stored.organization_id.to_string(),
        entity_type: stored.entity_type,
        workflow_config: stored.config,
        created_by: stored.created_by.to_string(),
        created_at: stored.created_at,
    }))
}

/// POST /workflows/approvals/:approval_id/decision
pub async fn decide_approval(
    State(state): State<AppState>,
    Path(approval_id): Path<String>,
    body: Bytes,
) -> Result<Json<DecisionResponse>, ApiError> {
    let body: DecisionBody = parse_body(&body)?;
    let missing = body.missing_fields();
    if !missing.is_empty() {
        return Err(ApiError::MissingFields(missing));
    }

    let decision_text = required(body.decision);
    let decision = DecisionKind::parse(&decision_text).ok_or(ApiError::InvalidDecision(decision_text))?;
    let approval_request_id = ApprovalRequestId::from_string(&approval_id)
        .map_err(|_| WorkflowError::ApprovalNotFound(approval_id.clone()))?;

    let resolved = state
        .engine
        .decide(DecisionRequest {
            organization_id: OrganizationId::new(required(body.organization_id)),
            approval_request_id,
            actor: UserId::new(required(body.actor_user_id)),
            decision,
            notes: body.notes,
        })
        .await?;

    Ok(Json(DecisionResponse {
        approval_request_id: resolved.id.to_string(),
        status: resolved.status,
        approvals_received: resolved.approvals_received(),
        required_approvals: resolved.required_approvals,
        transition_id: resolved.transition_id.map(|id| id.to_string()),
    }))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    Ok(Json(state.engine.health().await?))
}
