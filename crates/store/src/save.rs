//! Save orchestration: uploads first, then a single document write.

use std::collections::BTreeMap;

use loom_core::{
    encode_lights, Asset, FabricId, FabricPayload, FabricUpdate, Light, ProjectId,
    ProjectRecord, SessionSnapshot, Slot,
};

use crate::{BlobStore, FabricStore, PersistenceError, ProjectStore};

/// Result of a fabric save: the record id plus each file uploaded on the way,
/// paired with the URL it now lives at.
#[derive(Debug, Clone)]
pub struct SavedFabric {
    pub id: FabricId,
    pub uploaded: Vec<(Asset, String)>,
}

/// Persists the snapshot as a new fabric, or as an update of `existing`.
///
/// File-backed bindings are uploaded before anything is written; a failed
/// upload returns early and no document is created or changed. Unbound slots
/// are stored as `null`, which on update clears the stored URL.
pub async fn save_fabric<B, F>(
    snapshot: &SessionSnapshot,
    blobs: &B,
    fabrics: &F,
    existing: Option<FabricId>,
) -> Result<SavedFabric, PersistenceError>
where
    B: BlobStore,
    F: FabricStore,
{
    if snapshot.fabric_name.trim().is_empty() {
        return Err(PersistenceError::ValidationFailure(
            "fabric name is required".to_string(),
        ));
    }

    let (maps, uploaded) = upload_bindings(&snapshot.bindings, blobs).await?;

    match existing {
        Some(id) => {
            let update = FabricUpdate {
                fabric_name: Some(snapshot.fabric_name.clone()),
                fabric_color: Some(snapshot.fabric_color.clone()),
                maps: Slot::ALL
                    .iter()
                    .map(|slot| (*slot, maps.get(slot).cloned()))
                    .collect(),
                params: snapshot.params.clone(),
            };
            fabrics.update_fabric(id, update).await?;
            tracing::info!("updated fabric {} ({})", id.0, snapshot.fabric_name);
            Ok(SavedFabric { id, uploaded })
        }
        None => {
            let payload = FabricPayload {
                fabric_name: snapshot.fabric_name.clone(),
                fabric_color: snapshot.fabric_color.clone(),
                maps,
                params: snapshot.params.clone(),
            };
            let id = fabrics.create_fabric(payload).await?;
            tracing::info!("created fabric {} ({})", id.0, snapshot.fabric_name);
            Ok(SavedFabric { id, uploaded })
        }
    }
}

/// Stores the current lights as a named project.
pub async fn save_lights<P: ProjectStore>(
    name: &str,
    lights: &[Light],
    projects: &P,
) -> Result<ProjectId, PersistenceError> {
    let record = ProjectRecord {
        name: name.to_string(),
        lights: encode_lights(lights),
    };
    let id = projects.create_project(record).await?;
    tracing::info!("saved {} lights as project {} ({})", lights.len(), id.0, name);
    Ok(id)
}

async fn upload_bindings<B: BlobStore>(
    bindings: &BTreeMap<Slot, Asset>,
    blobs: &B,
) -> Result<(BTreeMap<Slot, String>, Vec<(Asset, String)>), PersistenceError> {
    // One asset feeding several slots is uploaded once.
    let mut uploaded: Vec<(Asset, String)> = Vec::new();
    let mut maps = BTreeMap::new();
    for (slot, asset) in bindings {
        let url = match asset {
            Asset::Url(url) => url.clone(),
            Asset::File(file) => {
                if let Some((_, url)) = uploaded.iter().find(|(seen, _)| seen == asset) {
                    url.clone()
                } else {
                    let url = blobs
                        .upload(&file.bytes, &file.name, &file.content_type)
                        .await
                        .inspect_err(|err| {
                            tracing::error!("upload of {} failed: {}", file.name, err)
                        })?;
                    uploaded.push((asset.clone(), url.clone()));
                    url
                }
            }
        };
        maps.insert(*slot, url);
    }
    Ok((maps, uploaded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryBlobStore, MemoryStore};
    use loom_core::{EditorSession, LightKind, LightParams, ParamValue, RequestKind};

    fn session_with_maps() -> EditorSession {
        let mut session = EditorSession::new();
        session.set_fabric_name("Corduroy");
        let file = session.create_source_node();
        session.attach_asset(file, Asset::file("c_d.png", "image/png", vec![1, 2, 3]));
        session.connect(file, Slot::Diffuse).unwrap();
        session.connect(file, Slot::Emissive).unwrap();
        let remote = session.create_source_node();
        session.attach_asset(remote, Asset::url("https://cdn/c_n.png"));
        session.connect(remote, Slot::Normal).unwrap();
        session.set_parameter("normalScale", ParamValue::Vec2([2.0, 2.0]));
        session
    }

    #[tokio::test]
    async fn create_uploads_files_once_and_keeps_urls() {
        let session = session_with_maps();
        let blobs = MemoryBlobStore::default();
        let store = MemoryStore::new();

        let saved = save_fabric(&session.snapshot(), &blobs, &store, None)
            .await
            .unwrap();
        let id = saved.id;

        assert_eq!(blobs.blob_count().await, 1);
        assert_eq!(saved.uploaded.len(), 1);
        let stored = store.get_fabric(id).await.unwrap().fabric;
        let diffuse = stored.map_url(Slot::Diffuse).unwrap();
        assert!(diffuse.starts_with("memory://blobs/"));
        assert!(diffuse.ends_with("-c_d.png"));
        assert_eq!(stored.map_url(Slot::Emissive), Some(diffuse));
        assert_eq!(stored.map_url(Slot::Normal), Some("https://cdn/c_n.png"));
        assert_eq!(stored.map_url(Slot::Bump), None);
        assert_eq!(
            stored.params.get("normalScale"),
            Some(&ParamValue::Vec2([2.0, 2.0]))
        );
    }

    #[tokio::test]
    async fn failed_upload_writes_nothing() {
        let session = session_with_maps();
        let blobs = MemoryBlobStore::default();
        blobs.set_rejecting(true);
        let store = MemoryStore::new();

        let result = save_fabric(&session.snapshot(), &blobs, &store, None).await;

        assert!(matches!(result, Err(PersistenceError::StorageFailure(_))));
        assert!(store.list_fabrics().await.unwrap().is_empty());
        assert_eq!(session.material().bindings().len(), 3);
    }

    #[tokio::test]
    async fn update_clears_slots_unbound_since_load() {
        let blobs = MemoryBlobStore::default();
        let store = MemoryStore::new();
        let mut session = session_with_maps();
        let id = save_fabric(&session.snapshot(), &blobs, &store, None)
            .await
            .unwrap()
            .id;

        let ticket = session.begin_request(RequestKind::Fabric);
        let stored = store.get_fabric(id).await.unwrap();
        session.load_fabric(&ticket, id, &stored.fabric).unwrap();
        let normal = session.graph().feeder(Slot::Normal).unwrap();
        session.delete_source_node(normal);
        session.set_fabric_name("Corduroy v2");

        save_fabric(&session.snapshot(), &blobs, &store, session.fabric_id())
            .await
            .unwrap();

        let stored = store.get_fabric(id).await.unwrap().fabric;
        assert_eq!(stored.fabric_name, "Corduroy v2");
        assert_eq!(stored.map_url(Slot::Normal), None);
        assert!(stored.map_url(Slot::Diffuse).is_some());
        assert_eq!(store.list_fabrics().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn second_save_reuses_uploaded_urls() {
        let blobs = MemoryBlobStore::default();
        let store = MemoryStore::new();
        let mut session = session_with_maps();
        let ticket = session.begin_save();
        let saved = save_fabric(&session.snapshot(), &blobs, &store, None)
            .await
            .unwrap();
        session.finish_save(&ticket, saved.id, &saved.uploaded).unwrap();
        let first_url = store.get_fabric(saved.id).await.unwrap().fabric;
        let first_url = first_url.map_url(Slot::Diffuse).map(str::to_string);

        session.set_fabric_name("Corduroy v2");
        let again = save_fabric(&session.snapshot(), &blobs, &store, session.fabric_id())
            .await
            .unwrap();

        assert_eq!(again.id, saved.id);
        assert!(again.uploaded.is_empty());
        assert_eq!(blobs.blob_count().await, 1);
        let stored = store.get_fabric(saved.id).await.unwrap().fabric;
        assert_eq!(stored.map_url(Slot::Diffuse).map(str::to_string), first_url);
        assert_eq!(stored.map_url(Slot::Emissive).map(str::to_string), first_url);
    }

    #[tokio::test]
    async fn unnamed_fabric_uploads_nothing() {
        let mut session = session_with_maps();
        session.set_fabric_name("");
        let blobs = MemoryBlobStore::default();
        let store = MemoryStore::new();
        assert!(matches!(
            save_fabric(&session.snapshot(), &blobs, &store, None).await,
            Err(PersistenceError::ValidationFailure(_))
        ));
        assert_eq!(blobs.blob_count().await, 0);
    }

    #[tokio::test]
    async fn lights_round_trip_through_project() {
        let store = MemoryStore::new();
        let mut session = EditorSession::new();
        session.lights_mut().add_light_of(LightKind::Point).unwrap();
        session.lights_mut().add_light_of(LightKind::Spot).unwrap();

        let id = save_lights("evening", session.lights().lights(), &store)
            .await
            .unwrap();
        let stored = store.get_project(id).await.unwrap();

        let mut other = EditorSession::new();
        let ticket = other.begin_request(RequestKind::Project);
        assert_eq!(other.apply_project(&ticket, &stored.project), Ok(2));
        assert_eq!(other.lights().count(LightKind::Point), 1);
        assert!(matches!(
            other.lights().lights()[1].params,
            LightParams::Spot { .. }
        ));
    }
}
