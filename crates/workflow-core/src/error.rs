//! Error types for the workflow system

use thiserror::Error;

/// Main error type for all workflow operations
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Entity {entity_id} not found in organization {organization_id}")]
    EntityNotFound {
        entity_id: String,
        organization_id: String,
    },

    #[error("No workflow configured for entity type {entity_type}")]
    NotConfigured { entity_type: String },

    #[error("No transition from {from_state} to {to_state}")]
    InvalidTransition { from_state: String, to_state: String },

    #[error("Entity is in state {actual} but the transition starts from {expected}")]
    StateMismatch { expected: String, actual: String },

    #[error("Invalid workflow configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    #[error("Actor {actor} is not permitted to force this transition")]
    ForceNotPermitted { actor: String },

    #[error("Approval request {0} not found")]
    ApprovalNotFound(String),

    #[error("Approval request {id} is already {status}")]
    ApprovalNotPending { id: String, status: String },

    #[error("Actor {actor} is not permitted to decide this approval request")]
    ApproverNotPermitted { actor: String },

    #[error("Actor {actor} has already decided this approval request")]
    DuplicateDecision { actor: String },

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for workflow operations
pub type Result<T> = std::result::Result<T, WorkflowError>;
