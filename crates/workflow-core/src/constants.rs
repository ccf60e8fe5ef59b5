/// Workflow configuration constants

/// Relationship type linking an entity to an approval request opened for it
pub const REQUIRES_APPROVAL: &str = "REQUIRES_APPROVAL";

/// Relationship type linking an entity to an executed transition's audit record
pub const WORKFLOW_AUDIT: &str = "WORKFLOW_AUDIT";

/// Pending approvals above this count degrade the health status
pub const PENDING_APPROVALS_DEGRADED_THRESHOLD: usize = 50;

/// Rejected approvals above this count mark the service unhealthy
pub const REJECTED_APPROVALS_UNHEALTHY_THRESHOLD: usize = 100;
