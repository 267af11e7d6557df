use std::collections::BTreeMap;

use loom_core::{
    FabricId, FabricPayload, FabricSummary, FabricUpdate, ProjectId, ProjectRecord,
    ProjectSummary,
};
use tokio::sync::Mutex;

use crate::{
    now_secs, validate_fabric, validate_project, FabricStore, PersistenceError, ProjectStore,
    StoredFabric, StoredProject,
};

#[derive(Debug, Default)]
struct Documents {
    next_fabric: u64,
    next_project: u64,
    fabrics: BTreeMap<FabricId, StoredFabric>,
    projects: BTreeMap<ProjectId, StoredProject>,
}

/// Process-local document store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: Mutex<Documents>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FabricStore for MemoryStore {
    async fn create_fabric(&self, payload: FabricPayload) -> Result<FabricId, PersistenceError> {
        validate_fabric(&payload)?;
        let mut docs = self.docs.lock().await;
        docs.next_fabric += 1;
        let id = FabricId(docs.next_fabric);
        docs.fabrics.insert(
            id,
            StoredFabric {
                id,
                created_at: now_secs(),
                fabric: payload,
            },
        );
        Ok(id)
    }

    async fn update_fabric(
        &self,
        id: FabricId,
        update: FabricUpdate,
    ) -> Result<(), PersistenceError> {
        let mut docs = self.docs.lock().await;
        let stored = docs
            .fabrics
            .get_mut(&id)
            .ok_or_else(|| PersistenceError::NotFound(format!("fabric {}", id.0)))?;
        let mut fabric = stored.fabric.clone();
        fabric.apply(&update);
        validate_fabric(&fabric)?;
        stored.fabric = fabric;
        Ok(())
    }

    async fn get_fabric(&self, id: FabricId) -> Result<StoredFabric, PersistenceError> {
        let docs = self.docs.lock().await;
        docs.fabrics
            .get(&id)
            .cloned()
            .ok_or_else(|| PersistenceError::NotFound(format!("fabric {}", id.0)))
    }

    async fn list_fabrics(&self) -> Result<Vec<FabricSummary>, PersistenceError> {
        let docs = self.docs.lock().await;
        Ok(docs.fabrics.values().map(StoredFabric::summary).collect())
    }
}

impl ProjectStore for MemoryStore {
    async fn create_project(&self, record: ProjectRecord) -> Result<ProjectId, PersistenceError> {
        validate_project(&record)?;
        let mut docs = self.docs.lock().await;
        docs.next_project += 1;
        let id = ProjectId(docs.next_project);
        docs.projects.insert(
            id,
            StoredProject {
                id,
                created_at: now_secs(),
                is_default: false,
                project: record,
            },
        );
        Ok(id)
    }

    async fn get_project(&self, id: ProjectId) -> Result<StoredProject, PersistenceError> {
        let docs = self.docs.lock().await;
        docs.projects
            .get(&id)
            .cloned()
            .ok_or_else(|| PersistenceError::NotFound(format!("project {}", id.0)))
    }

    async fn list_projects(&self) -> Result<Vec<ProjectSummary>, PersistenceError> {
        let docs = self.docs.lock().await;
        Ok(docs.projects.values().map(StoredProject::summary).collect())
    }

    async fn set_default_project(&self, id: ProjectId) -> Result<(), PersistenceError> {
        let mut docs = self.docs.lock().await;
        if !docs.projects.contains_key(&id) {
            return Err(PersistenceError::NotFound(format!("project {}", id.0)));
        }
        for project in docs.projects.values_mut() {
            project.is_default = project.id == id;
        }
        Ok(())
    }

    async fn get_default_project(&self) -> Result<StoredProject, PersistenceError> {
        let docs = self.docs.lock().await;
        docs.projects
            .values()
            .find(|project| project.is_default)
            .cloned()
            .ok_or_else(|| PersistenceError::NotFound("default project".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_core::{LightRecord, Slot};

    fn payload(name: &str) -> FabricPayload {
        FabricPayload {
            fabric_name: name.to_string(),
            fabric_color: "#aabbcc".to_string(),
            maps: BTreeMap::from([
                (Slot::Diffuse, "https://cdn/d.png".to_string()),
                (Slot::Roughness, "https://cdn/r.png".to_string()),
            ]),
            params: BTreeMap::new(),
        }
    }

    fn project(name: &str) -> ProjectRecord {
        ProjectRecord {
            name: name.to_string(),
            lights: vec![LightRecord {
                light_type: "Ambient Light 1".to_string(),
                intensity: 1.0,
                position: "[0,0,0]".to_string(),
                target_position: None,
                angle: None,
                decay: None,
                cast_shadow: true,
            }],
        }
    }

    #[tokio::test]
    async fn update_keeps_omitted_and_clears_null() {
        let store = MemoryStore::new();
        let id = store.create_fabric(payload("Denim")).await.unwrap();

        let update: FabricUpdate =
            serde_json::from_str(r#"{"fabricName":"Denim 2","roughnessMapUrl":null}"#).unwrap();
        store.update_fabric(id, update).await.unwrap();

        let stored = store.get_fabric(id).await.unwrap();
        assert_eq!(stored.fabric.fabric_name, "Denim 2");
        assert_eq!(stored.fabric.fabric_color, "#aabbcc");
        assert_eq!(stored.fabric.map_url(Slot::Diffuse), Some("https://cdn/d.png"));
        assert_eq!(stored.fabric.map_url(Slot::Roughness), None);
    }

    #[tokio::test]
    async fn missing_records_are_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.get_fabric(FabricId(9)).await,
            Err(PersistenceError::NotFound(_))
        ));
        assert!(matches!(
            store.update_fabric(FabricId(9), FabricUpdate::default()).await,
            Err(PersistenceError::NotFound(_))
        ));
        assert!(matches!(
            store.get_default_project().await,
            Err(PersistenceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn unnamed_fabric_is_rejected() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.create_fabric(payload("  ")).await,
            Err(PersistenceError::ValidationFailure(_))
        ));
        assert!(store.list_fabrics().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn at_most_one_default_project() {
        let store = MemoryStore::new();
        let a = store.create_project(project("a")).await.unwrap();
        let b = store.create_project(project("b")).await.unwrap();

        store.set_default_project(a).await.unwrap();
        store.set_default_project(b).await.unwrap();

        let defaults: Vec<_> = store
            .list_projects()
            .await
            .unwrap()
            .into_iter()
            .filter(|summary| summary.is_default)
            .collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].id, b);
        assert_eq!(store.get_default_project().await.unwrap().project.name, "b");
    }
}
