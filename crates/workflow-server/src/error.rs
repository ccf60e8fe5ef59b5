//! API error type
//!
//! Maps workflow errors to HTTP status codes and machine-readable codes.
//! Internal failures are logged and answered with a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;
use workflow_core::WorkflowError;
use workflow_types::ErrorBody;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request body is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Missing required query parameters: {}", .0.join(", "))]
    MissingParams(Vec<&'static str>),

    #[error("Invalid decision '{0}', expected approve or reject")]
    InvalidDecision(String),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

impl ApiError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::InvalidJson(_) => (StatusCode::BAD_REQUEST, "invalid_json"),
            Self::MissingFields(_) => (StatusCode::BAD_REQUEST, "missing_required_fields"),
            Self::MissingParams(_) => (StatusCode::BAD_REQUEST, "missing_required_params"),
            Self::InvalidDecision(_) => (StatusCode::BAD_REQUEST, "invalid_decision"),
            Self::Workflow(e) => match e {
                WorkflowError::EntityNotFound { .. } => (StatusCode::NOT_FOUND, "entity_not_found"),
                WorkflowError::NotConfigured { .. } => (StatusCode::BAD_REQUEST, "workflow_not_configured"),
                WorkflowError::InvalidTransition { .. } | WorkflowError::StateMismatch { .. } => {
                    (StatusCode::BAD_REQUEST, "invalid_transition")
                }
                WorkflowError::InvalidConfig(_) => (StatusCode::BAD_REQUEST, "invalid_workflow_config"),
                WorkflowError::ForceNotPermitted { .. } => (StatusCode::FORBIDDEN, "force_not_permitted"),
                WorkflowError::ApprovalNotFound(_) => (StatusCode::NOT_FOUND, "approval_not_found"),
                WorkflowError::ApprovalNotPending { .. } => (StatusCode::CONFLICT, "approval_not_pending"),
                WorkflowError::ApproverNotPermitted { .. } => (StatusCode::FORBIDDEN, "approver_not_permitted"),
                WorkflowError::DuplicateDecision { .. } => (StatusCode::CONFLICT, "duplicate_decision"),
                WorkflowError::ConcurrentModification(_) => (StatusCode::CONFLICT, "concurrent_modification"),
                WorkflowError::Config(_)
                | WorkflowError::Storage(_)
                | WorkflowError::Io(_)
                | WorkflowError::Json(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_server_error"),
            },
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            Self::MissingFields(fields) => Some(json!({ "fields": fields })),
            Self::MissingParams(params) => Some(json!({ "params": params })),
            Self::InvalidDecision(_) => Some(json!({ "valid_values": ["approve", "reject"] })),
            Self::Workflow(WorkflowError::InvalidConfig(errors)) => Some(json!({ "errors": errors })),
            Self::Workflow(WorkflowError::InvalidTransition { from_state, to_state }) => {
                Some(json!({ "from_state": from_state, "to_state": to_state }))
            }
            Self::Workflow(WorkflowError::StateMismatch { expected, actual }) => Some(json!({
                "reason": "state_mismatch",
                "expected_state": expected,
                "actual_state": actual,
            })),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let body = if status.is_server_error() {
            log::error!("Request failed: {}", self);
            ErrorBody {
                error: code.to_string(),
                message: "An internal error occurred".to_string(),
                details: None,
            }
        } else {
            log::debug!("Request rejected with {}: {}", code, self);
            ErrorBody {
                error: code.to_string(),
                message: self.to_string(),
                details: self.details(),
            }
        };

        (status, Json(body)).into_response()
    }
}
