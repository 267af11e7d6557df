use std::path::{Path, PathBuf};

use loom_core::{
    FabricId, FabricPayload, FabricSummary, FabricUpdate, ProjectId, ProjectRecord,
    ProjectSummary,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::{
    now_secs, validate_fabric, validate_project, FabricStore, PersistenceError, ProjectStore,
    StoredFabric, StoredProject,
};

const FABRICS_DIR: &str = "fabrics";
const PROJECTS_DIR: &str = "projects";

/// Document store keeping one pretty-printed JSON file per record.
///
/// Layout: `<root>/fabrics/<id>.json` and `<root>/projects/<id>.json`.
#[derive(Debug)]
pub struct JsonDirStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir(&self, kind: &str) -> PathBuf {
        self.root.join(kind)
    }

    fn doc_path(&self, kind: &str, id: u64) -> PathBuf {
        self.dir(kind).join(format!("{id}.json"))
    }

    async fn ids(&self, kind: &str) -> Result<Vec<u64>, PersistenceError> {
        let dir = self.dir(kind);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<u64>().ok())
            {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    async fn next_id(&self, kind: &str) -> Result<u64, PersistenceError> {
        Ok(self.ids(kind).await?.last().copied().unwrap_or(0) + 1)
    }

    async fn read_doc<T: DeserializeOwned>(
        &self,
        kind: &str,
        id: u64,
    ) -> Result<T, PersistenceError> {
        let path = self.doc_path(kind, id);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(PersistenceError::NotFound(format!(
                    "{} {}",
                    kind.trim_end_matches('s'),
                    id
                )));
            }
            Err(err) => return Err(err.into()),
        };
        serde_json::from_slice(&data).map_err(|err| {
            PersistenceError::StorageFailure(format!("corrupt {}: {}", path.display(), err))
        })
    }

    /// Every readable document of `kind`. Unreadable ones are skipped so a
    /// single bad file does not hide the rest.
    async fn read_all<T: DeserializeOwned>(
        &self,
        kind: &str,
    ) -> Result<Vec<T>, PersistenceError> {
        let mut docs = Vec::new();
        for id in self.ids(kind).await? {
            match self.read_doc(kind, id).await {
                Ok(doc) => docs.push(doc),
                Err(err) => tracing::warn!("skipping {} {}: {}", kind, id, err),
            }
        }
        Ok(docs)
    }

    async fn write_doc<T: Serialize>(
        &self,
        kind: &str,
        id: u64,
        doc: &T,
    ) -> Result<(), PersistenceError> {
        let data = serde_json::to_vec_pretty(doc)?;
        tokio::fs::create_dir_all(self.dir(kind)).await?;
        let path = self.doc_path(kind, id);
        tokio::fs::write(&path, data).await?;
        tracing::debug!("wrote {}", path.display());
        Ok(())
    }

    async fn all_projects(&self) -> Result<Vec<StoredProject>, PersistenceError> {
        self.read_all(PROJECTS_DIR).await
    }
}

impl FabricStore for JsonDirStore {
    async fn create_fabric(&self, payload: FabricPayload) -> Result<FabricId, PersistenceError> {
        validate_fabric(&payload)?;
        let _guard = self.write_lock.lock().await;
        let id = FabricId(self.next_id(FABRICS_DIR).await?);
        let doc = StoredFabric {
            id,
            created_at: now_secs(),
            fabric: payload,
        };
        self.write_doc(FABRICS_DIR, id.0, &doc).await?;
        Ok(id)
    }

    async fn update_fabric(
        &self,
        id: FabricId,
        update: FabricUpdate,
    ) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;
        let mut doc: StoredFabric = self.read_doc(FABRICS_DIR, id.0).await?;
        doc.fabric.apply(&update);
        validate_fabric(&doc.fabric)?;
        self.write_doc(FABRICS_DIR, id.0, &doc).await
    }

    async fn get_fabric(&self, id: FabricId) -> Result<StoredFabric, PersistenceError> {
        self.read_doc(FABRICS_DIR, id.0).await
    }

    async fn list_fabrics(&self) -> Result<Vec<FabricSummary>, PersistenceError> {
        let docs: Vec<StoredFabric> = self.read_all(FABRICS_DIR).await?;
        Ok(docs.iter().map(StoredFabric::summary).collect())
    }
}

impl ProjectStore for JsonDirStore {
    async fn create_project(&self, record: ProjectRecord) -> Result<ProjectId, PersistenceError> {
        validate_project(&record)?;
        let _guard = self.write_lock.lock().await;
        let id = ProjectId(self.next_id(PROJECTS_DIR).await?);
        let doc = StoredProject {
            id,
            created_at: now_secs(),
            is_default: false,
            project: record,
        };
        self.write_doc(PROJECTS_DIR, id.0, &doc).await?;
        Ok(id)
    }

    async fn get_project(&self, id: ProjectId) -> Result<StoredProject, PersistenceError> {
        self.read_doc(PROJECTS_DIR, id.0).await
    }

    async fn list_projects(&self) -> Result<Vec<ProjectSummary>, PersistenceError> {
        Ok(self
            .all_projects()
            .await?
            .iter()
            .map(StoredProject::summary)
            .collect())
    }

    async fn set_default_project(&self, id: ProjectId) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;
        let projects = self.all_projects().await?;
        if !projects.iter().any(|project| project.id == id) {
            return Err(PersistenceError::NotFound(format!("project {}", id.0)));
        }
        // Other defaults are cleared before the new flag is written.
        for mut project in projects.iter().filter(|p| p.is_default && p.id != id).cloned() {
            project.is_default = false;
            self.write_doc(PROJECTS_DIR, project.id.0, &project).await?;
        }
        if let Some(mut target) = projects.into_iter().find(|project| project.id == id) {
            if !target.is_default {
                target.is_default = true;
                self.write_doc(PROJECTS_DIR, id.0, &target).await?;
            }
        }
        Ok(())
    }

    async fn get_default_project(&self) -> Result<StoredProject, PersistenceError> {
        self.all_projects()
            .await?
            .into_iter()
            .find(|project| project.is_default)
            .ok_or_else(|| PersistenceError::NotFound("default project".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_core::{LightRecord, ParamValue, Slot};
    use std::collections::BTreeMap;

    fn project(name: &str) -> ProjectRecord {
        ProjectRecord {
            name: name.to_string(),
            lights: vec![LightRecord {
                light_type: "Spot Light 1".to_string(),
                intensity: 3.0,
                position: "[0,5,0]".to_string(),
                target_position: Some("[0,0,0]".to_string()),
                angle: Some(0.4),
                decay: None,
                cast_shadow: true,
            }],
        }
    }

    fn named_fabric(name: &str) -> FabricPayload {
        FabricPayload {
            fabric_name: name.to_string(),
            ..FabricPayload::default()
        }
    }

    #[tokio::test]
    async fn fabrics_persist_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let payload = FabricPayload {
            fabric_name: "Linen".to_string(),
            fabric_color: "rgb(1,2,3)".to_string(),
            maps: BTreeMap::from([(Slot::Bump, "file://blobs/b.png".to_string())]),
            params: BTreeMap::from([("bumpScale".to_string(), ParamValue::Float(0.5))]),
        };

        let id = {
            let store = JsonDirStore::new(dir.path());
            store.create_fabric(payload.clone()).await.unwrap()
        };
        assert!(dir.path().join("fabrics").join("1.json").exists());

        let store = JsonDirStore::new(dir.path());
        let stored = store.get_fabric(id).await.unwrap();
        assert_eq!(stored.fabric, payload);

        let second = store
            .create_fabric(FabricPayload {
                fabric_name: "Silk".to_string(),
                ..FabricPayload::default()
            })
            .await
            .unwrap();
        assert_eq!(second, FabricId(2));
        let names: Vec<String> = store
            .list_fabrics()
            .await
            .unwrap()
            .into_iter()
            .map(|summary| summary.fabric_name)
            .collect();
        assert_eq!(names, vec!["Linen".to_string(), "Silk".to_string()]);
    }

    #[tokio::test]
    async fn update_applies_partial_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::new(dir.path());
        let id = store
            .create_fabric(FabricPayload {
                fabric_name: "Wool".to_string(),
                maps: BTreeMap::from([
                    (Slot::Diffuse, "d.png".to_string()),
                    (Slot::AO, "ao.png".to_string()),
                ]),
                ..FabricPayload::default()
            })
            .await
            .unwrap();

        let update = FabricUpdate {
            maps: BTreeMap::from([(Slot::AO, None), (Slot::Normal, Some("n.png".to_string()))]),
            ..FabricUpdate::default()
        };
        store.update_fabric(id, update).await.unwrap();

        let stored = store.get_fabric(id).await.unwrap().fabric;
        assert_eq!(stored.fabric_name, "Wool");
        assert_eq!(stored.map_url(Slot::Diffuse), Some("d.png"));
        assert_eq!(stored.map_url(Slot::AO), None);
        assert_eq!(stored.map_url(Slot::Normal), Some("n.png"));
    }

    #[tokio::test]
    async fn single_default_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::new(dir.path());
        let a = store.create_project(project("a")).await.unwrap();
        let b = store.create_project(project("b")).await.unwrap();

        store.set_default_project(a).await.unwrap();
        store.set_default_project(b).await.unwrap();
        store.set_default_project(b).await.unwrap();

        let reopened = JsonDirStore::new(dir.path());
        let defaults = reopened
            .list_projects()
            .await
            .unwrap()
            .into_iter()
            .filter(|summary| summary.is_default)
            .count();
        assert_eq!(defaults, 1);
        let default = reopened.get_default_project().await.unwrap();
        assert_eq!(default.id, b);
        assert_eq!(default.project.lights[0].angle, Some(0.4));

        assert!(matches!(
            reopened.set_default_project(ProjectId(40)).await,
            Err(PersistenceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn corrupt_document_is_storage_failure() {
        let dir = tempfile::tempdir().unwrap();
        let fabrics = dir.path().join("fabrics");
        std::fs::create_dir_all(&fabrics).unwrap();
        std::fs::write(fabrics.join("1.json"), b"{ not json").unwrap();

        let store = JsonDirStore::new(dir.path());
        assert!(matches!(
            store.get_fabric(FabricId(1)).await,
            Err(PersistenceError::StorageFailure(_))
        ));
        assert!(matches!(
            store.get_fabric(FabricId(2)).await,
            Err(PersistenceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn listings_skip_corrupt_documents() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::new(dir.path());
        let tweed = store.create_fabric(named_fabric("Tweed")).await.unwrap();
        let good = store.create_project(project("studio")).await.unwrap();
        store.set_default_project(good).await.unwrap();
        std::fs::write(dir.path().join("fabrics").join("9.json"), b"{ not json").unwrap();
        std::fs::write(dir.path().join("projects").join("9.json"), b"[]").unwrap();

        let fabrics = store.list_fabrics().await.unwrap();
        assert_eq!(fabrics.len(), 1);
        assert_eq!(fabrics[0].id, tweed);
        assert_eq!(store.list_projects().await.unwrap().len(), 1);
        assert_eq!(store.get_default_project().await.unwrap().id, good);
        assert!(matches!(
            store.get_project(ProjectId(9)).await,
            Err(PersistenceError::StorageFailure(_))
        ));
        assert_eq!(
            store.create_fabric(named_fabric("Boucle")).await.unwrap(),
            FabricId(10)
        );
    }
}
