//! Bulk loading of entity-store records
//!
//! Entities and actor roles are owned by the surrounding application. This
//! loads an exported snapshot of them into a workflow store.

use serde::Deserialize;
use std::path::Path;
use crate::error::{Result, WorkflowError};
use crate::workflow::approval_types::{Entity, OrganizationId, UserId};
use crate::workflow::traits::WorkflowStore;

#[derive(Debug, Clone, Deserialize)]
pub struct ActorRoles {
    pub organization_id: OrganizationId,
    pub user_id: UserId,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Snapshot of entities and actor roles to load into a store
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreImport {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub actors: Vec<ActorRoles>,
}

impl StoreImport {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| WorkflowError::Storage(format!("Failed to parse import file: {}", e)))
    }

    /// Write every record into the store, returning (entities, actors) counts
    pub async fn apply(self, store: &dyn WorkflowStore) -> Result<(usize, usize)> {
        let entity_count = self.entities.len();
        let actor_count = self.actors.len();

        for entity in self.entities {
            store.put_entity(entity).await?;
        }
        for actor in self.actors {
            store
                .set_actor_roles(&actor.organization_id, &actor.user_id, actor.roles)
                .await?;
        }

        log::info!("Imported {} entities and {} actors", entity_count, actor_count);
        Ok((entity_count, actor_count))
    }
}
