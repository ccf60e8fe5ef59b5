//! Workflow Core Library
//!
//! Configurable per-entity-type state machines with approval gating and an
//! immutable audit trail, over a pluggable record store.

pub mod config;
pub mod constants;
pub mod error;
pub mod paths;
pub mod store;
pub mod workflow;

// Re-export main types for easy access
pub use config::{ServiceConfig, StorageBackend};
pub use error::{Result, WorkflowError};

pub use store::{FileStore, MemoryStore, StoreImport};

pub use workflow::{
    ApprovalRequest,
    ApprovalRequestId,
    AuditId,
    DecisionRequest,
    Entity,
    EntityId,
    OrganizationId,
    StatusOptions,
    StoredWorkflowConfig,
    TransitionOutcome,
    TransitionRequest,
    UserId,
    WorkflowAuditRecord,
    WorkflowEngine,
    WorkflowStore,
};
