//! Workflow state machine, approval gating and audit trail

pub mod approval_gate;
pub mod approval_types;
pub mod config_validator;
pub mod engine;
pub mod executor;
pub mod query;
pub mod resolver;
pub mod traits;
pub mod validator;

pub use approval_types::*;
pub use engine::{DecisionRequest, TransitionOutcome, TransitionRequest, WorkflowEngine};
pub use query::StatusOptions;
pub use traits::{WorkflowCommit, WorkflowStore};
