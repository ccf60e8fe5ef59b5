//! Workflow configuration resolution

use crate::error::Result;
use super::approval_types::{OrganizationId, StoredWorkflowConfig};
use super::traits::WorkflowStore;

/// Newest config for the entity type within the organization.
///
/// Absence is not an error: callers branch on `None`. Nothing is cached, so a
/// config stored by `PUT /workflows` applies to the very next request.
pub async fn resolve_config<S: WorkflowStore + ?Sized>(
    store: &S,
    organization_id: &OrganizationId,
    entity_type: &str,
) -> Result<Option<StoredWorkflowConfig>> {
    let config = store.latest_config(organization_id, entity_type).await?;
    match &config {
        Some(c) => log::debug!("Resolved workflow config {} for {}/{}", c.config_id, organization_id, entity_type),
        None => log::debug!("No workflow config for {}/{}", organization_id, entity_type),
    }
    Ok(config)
}
