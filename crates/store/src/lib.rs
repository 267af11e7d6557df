//! Persistence contracts for fabrics and light projects, plus the backends the
//! editor ships with.

mod blob;
pub mod config;
mod json_dir;
mod memory;
pub mod save;

pub use blob::{LocalBlobStore, MemoryBlob, MemoryBlobStore};
pub use config::StoreConfig;
pub use json_dir::JsonDirStore;
pub use memory::MemoryStore;

use loom_core::{
    FabricId, FabricPayload, FabricSummary, FabricUpdate, ProjectId, ProjectRecord,
    ProjectSummary,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage failure: {0}")]
    StorageFailure(String),

    #[error("validation failure: {0}")]
    ValidationFailure(String),
}

impl From<std::io::Error> for PersistenceError {
    fn from(err: std::io::Error) -> Self {
        PersistenceError::StorageFailure(err.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::ValidationFailure(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFabric {
    pub id: FabricId,
    pub created_at: u64,
    pub fabric: FabricPayload,
}

impl StoredFabric {
    pub fn summary(&self) -> FabricSummary {
        FabricSummary {
            id: self.id,
            fabric_name: self.fabric.fabric_name.clone(),
            fabric_color: self.fabric.fabric_color.clone(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredProject {
    pub id: ProjectId,
    pub created_at: u64,
    pub is_default: bool,
    pub project: ProjectRecord,
}

impl StoredProject {
    pub fn summary(&self) -> ProjectSummary {
        ProjectSummary {
            id: self.id,
            name: self.project.name.clone(),
            created_at: self.created_at,
            is_default: self.is_default,
        }
    }
}

/// Document store for fabric records.
#[allow(async_fn_in_trait)]
pub trait FabricStore {
    async fn create_fabric(&self, payload: FabricPayload) -> Result<FabricId, PersistenceError>;

    /// Partial overwrite: fields absent from `update` keep their stored value.
    async fn update_fabric(&self, id: FabricId, update: FabricUpdate)
        -> Result<(), PersistenceError>;

    async fn get_fabric(&self, id: FabricId) -> Result<StoredFabric, PersistenceError>;

    async fn list_fabrics(&self) -> Result<Vec<FabricSummary>, PersistenceError>;
}

/// Document store for light projects.
#[allow(async_fn_in_trait)]
pub trait ProjectStore {
    async fn create_project(&self, record: ProjectRecord) -> Result<ProjectId, PersistenceError>;

    async fn get_project(&self, id: ProjectId) -> Result<StoredProject, PersistenceError>;

    async fn list_projects(&self) -> Result<Vec<ProjectSummary>, PersistenceError>;

    /// Clears the flag on every other project, then sets it on `id`.
    async fn set_default_project(&self, id: ProjectId) -> Result<(), PersistenceError>;

    async fn get_default_project(&self) -> Result<StoredProject, PersistenceError>;
}

/// Blob storage for uploaded textures.
#[allow(async_fn_in_trait)]
pub trait BlobStore {
    /// Stores `bytes` under a collision-free key derived from `name` and
    /// returns the public URL.
    async fn upload(
        &self,
        bytes: &[u8],
        name: &str,
        content_type: &str,
    ) -> Result<String, PersistenceError>;
}

pub(crate) fn validate_fabric(payload: &FabricPayload) -> Result<(), PersistenceError> {
    if payload.fabric_name.trim().is_empty() {
        return Err(PersistenceError::ValidationFailure(
            "fabricName is required".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn validate_project(record: &ProjectRecord) -> Result<(), PersistenceError> {
    if record.name.trim().is_empty() {
        return Err(PersistenceError::ValidationFailure(
            "project name is required".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
