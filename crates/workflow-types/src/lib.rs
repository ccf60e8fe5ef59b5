//! Shared types for the workflow engine
//!
//! Workflow definitions and the JSON bodies exchanged over HTTP. Kept free
//! of storage and runtime concerns so clients can depend on it alone.

pub mod api;
pub mod definition;

pub use api::{ApprovalStatus, DecisionKind, ErrorBody, HealthStatus, TransitionStatus};
pub use definition::{
    ApprovalLevel,
    ApprovalRule,
    EscalationRule,
    NotificationRule,
    StateDefinition,
    TransitionDefinition,
    WorkflowConfig,
};
