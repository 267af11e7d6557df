use std::collections::BTreeMap;

use thiserror::Error;

use crate::asset::Asset;
use crate::graph::{ConnectionError, Edge, MaterialGraph, NodeId};
use crate::light::{Light, LightState};
use crate::material::{MaterialState, ParamValue};
use crate::record::{decode_lights, FabricId, FabricPayload, ProjectRecord};
use crate::slot::Slot;
use crate::thumbnail::{css_rgb, thumbnail_for_asset};

pub const DEFAULT_FABRIC_COLOR: &str = "#ffffff";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Fabric,
    Project,
}

/// Tag carried by an in-flight load so late responses can be recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket {
    kind: RequestKind,
    serial: u64,
    base_revision: u64,
}

impl RequestTicket {
    pub fn kind(&self) -> RequestKind {
        self.kind
    }
}

/// Tag carried by an in-flight save. It goes stale once the session moves on to
/// another fabric through `clear_fabric` or `load_fabric`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveTicket {
    generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("discarded stale {0:?} response")]
    Stale(RequestKind),
    #[error("fabric {0:?} was saved after the session moved on")]
    Replaced(FabricId),
}

/// Consistent copy of everything a save needs.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub fabric_id: Option<FabricId>,
    pub fabric_name: String,
    pub fabric_color: String,
    pub bindings: BTreeMap<Slot, Asset>,
    pub params: BTreeMap<String, ParamValue>,
    pub lights: Vec<Light>,
}

/// State of one editing session: graph, material, lights and fabric metadata.
#[derive(Debug, Clone)]
pub struct EditorSession {
    graph: MaterialGraph,
    material: MaterialState,
    lights: LightState,
    fabric_id: Option<FabricId>,
    fabric_name: String,
    fabric_color: String,
    last_fabric_request: u64,
    last_project_request: u64,
    fabric_generation: u64,
    // Material revisions caused by rebinding uploads, not by the user.
    rebind_revisions: u64,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self {
            graph: MaterialGraph::new(),
            material: MaterialState::new(),
            lights: LightState::new(),
            fabric_id: None,
            fabric_name: String::new(),
            fabric_color: DEFAULT_FABRIC_COLOR.to_string(),
            last_fabric_request: 0,
            last_project_request: 0,
            fabric_generation: 0,
            rebind_revisions: 0,
        }
    }
}

impl EditorSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graph(&self) -> &MaterialGraph {
        &self.graph
    }

    pub fn material(&self) -> &MaterialState {
        &self.material
    }

    pub fn lights(&self) -> &LightState {
        &self.lights
    }

    pub fn lights_mut(&mut self) -> &mut LightState {
        &mut self.lights
    }

    pub fn fabric_id(&self) -> Option<FabricId> {
        self.fabric_id
    }

    pub fn fabric_name(&self) -> &str {
        &self.fabric_name
    }

    pub fn fabric_color(&self) -> &str {
        &self.fabric_color
    }

    pub fn set_fabric_name(&mut self, name: impl Into<String>) {
        self.fabric_name = name.into();
    }

    pub fn set_fabric_color(&mut self, color: impl Into<String>) {
        self.fabric_color = color.into();
    }

    pub fn begin_save(&self) -> SaveTicket {
        SaveTicket {
            generation: self.fabric_generation,
        }
    }

    /// Records the id the store assigned and swaps uploaded files for their
    /// URLs, so the next save does not upload them again. A ticket from an
    /// earlier fabric leaves the session untouched.
    pub fn finish_save(
        &mut self,
        ticket: &SaveTicket,
        id: FabricId,
        uploaded: &[(Asset, String)],
    ) -> Result<(), SessionError> {
        if ticket.generation != self.fabric_generation {
            tracing::debug!("fabric {:?} saved for an earlier session", id);
            return Err(SessionError::Replaced(id));
        }
        self.fabric_id = Some(id);
        let before = self.material.revision();
        for (file, url) in uploaded {
            self.graph.rebind_asset(file, url, &mut self.material);
        }
        self.rebind_revisions += self.material.revision() - before;
        Ok(())
    }

    pub fn create_source_node(&mut self) -> NodeId {
        self.graph.create_source_node()
    }

    /// Binds `asset` to `node` and caches a thumbnail for local files.
    pub fn attach_asset(&mut self, node: NodeId, asset: Asset) {
        let thumbnail = match &asset {
            Asset::File(_) => match thumbnail_for_asset(&asset) {
                Ok(thumb) => Some(thumb),
                Err(err) => {
                    tracing::warn!("no thumbnail for {}: {}", asset.label(), err);
                    None
                }
            },
            Asset::Url(_) => None,
        };
        self.graph.attach_asset(node, asset, &mut self.material);
        if let Some(thumb) = thumbnail {
            self.graph.set_thumbnail(node, thumb);
        }
    }

    pub fn set_node_position(&mut self, node: NodeId, position: [f32; 2]) {
        self.graph.set_position(node, position);
    }

    pub fn connect(&mut self, node: NodeId, slot: Slot) -> Result<Edge, ConnectionError> {
        self.graph.connect(node, slot, &mut self.material)
    }

    pub fn connect_named(&mut self, node: NodeId, slot: &str) -> Result<Edge, ConnectionError> {
        self.graph.connect_named(node, slot, &mut self.material)
    }

    pub fn disconnect(&mut self, edge: Edge) {
        self.graph.disconnect(edge, &mut self.material);
    }

    pub fn delete_source_node(&mut self, node: NodeId) {
        self.graph.delete_source_node(node, &mut self.material);
    }

    pub fn set_parameter(&mut self, name: impl Into<String>, value: ParamValue) {
        self.material.set_parameter(name, value);
    }

    /// Average color of the diffuse feeder's thumbnail, when one is cached.
    pub fn suggested_color(&self) -> Option<String> {
        let node = self.graph.feeder(Slot::Diffuse)?;
        let thumb = self.graph.node(node)?.thumbnail.as_ref()?;
        Some(css_rgb(thumb.average_color))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            fabric_id: self.fabric_id,
            fabric_name: self.fabric_name.clone(),
            fabric_color: self.fabric_color.clone(),
            bindings: self.material.bindings().clone(),
            params: self.material.parameters().clone(),
            lights: self.lights.lights().to_vec(),
        }
    }

    /// Starts a new fabric session, keeping the light setup.
    pub fn clear_fabric(&mut self) {
        let nodes: Vec<NodeId> = self.graph.nodes().map(|node| node.id).collect();
        for node in nodes {
            self.graph.delete_source_node(node, &mut self.material);
        }
        self.graph = MaterialGraph::new();
        self.material.reset_parameters();
        self.fabric_id = None;
        self.fabric_name.clear();
        self.fabric_color = DEFAULT_FABRIC_COLOR.to_string();
        self.last_fabric_request += 1;
        self.fabric_generation += 1;
    }

    /// Issues a ticket for an async load. Any earlier ticket of the same kind
    /// becomes stale.
    pub fn begin_request(&mut self, kind: RequestKind) -> RequestTicket {
        let serial = match kind {
            RequestKind::Fabric => {
                self.last_fabric_request += 1;
                self.last_fabric_request
            }
            RequestKind::Project => {
                self.last_project_request += 1;
                self.last_project_request
            }
        };
        RequestTicket {
            kind,
            serial,
            base_revision: self.edit_revision(kind),
        }
    }

    /// True when no newer request of the same kind was issued and the state it
    /// would overwrite has not been edited since the request started.
    pub fn accepts(&self, ticket: &RequestTicket) -> bool {
        let latest = match ticket.kind {
            RequestKind::Fabric => self.last_fabric_request,
            RequestKind::Project => self.last_project_request,
        };
        latest == ticket.serial && self.edit_revision(ticket.kind) == ticket.base_revision
    }

    /// Replaces the fabric being edited with a stored one.
    pub fn load_fabric(
        &mut self,
        ticket: &RequestTicket,
        id: FabricId,
        payload: &FabricPayload,
    ) -> Result<(), SessionError> {
        if ticket.kind != RequestKind::Fabric || !self.accepts(ticket) {
            tracing::debug!("dropping fabric {:?}", id);
            return Err(SessionError::Stale(RequestKind::Fabric));
        }

        let mut material = MaterialState::new();
        let graph = MaterialGraph::hydrate(
            payload
                .maps
                .iter()
                .map(|(slot, url)| (*slot, Asset::url(url.clone()))),
            &mut material,
        );
        material.apply_stored_parameters(&payload.params);
        self.material.sync_bindings(material.bindings());
        for (name, value) in material.parameters() {
            self.material.set_parameter(name.clone(), value.clone());
        }
        self.graph = graph;
        self.fabric_id = Some(id);
        self.fabric_name = payload.fabric_name.clone();
        self.fabric_color = if payload.fabric_color.is_empty() {
            DEFAULT_FABRIC_COLOR.to_string()
        } else {
            payload.fabric_color.clone()
        };
        self.last_fabric_request += 1;
        self.fabric_generation += 1;
        tracing::info!("loaded fabric {:?} ({})", id, self.fabric_name);
        Ok(())
    }

    /// Replaces the light setup with a stored project's lights.
    pub fn apply_project(
        &mut self,
        ticket: &RequestTicket,
        record: &ProjectRecord,
    ) -> Result<usize, SessionError> {
        if ticket.kind != RequestKind::Project || !self.accepts(ticket) {
            tracing::debug!("dropping project {}", record.name);
            return Err(SessionError::Stale(RequestKind::Project));
        }
        let lights = decode_lights(&record.lights);
        let count = lights.len();
        self.lights.reset_lights(lights);
        self.last_project_request += 1;
        tracing::info!("loaded project {} with {} lights", record.name, count);
        Ok(count)
    }

    fn edit_revision(&self, kind: RequestKind) -> u64 {
        match kind {
            RequestKind::Fabric => {
                self.graph.revision() + (self.material.revision() - self.rebind_revisions)
            }
            RequestKind::Project => self.lights.revision(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::{LightKind, LightParams};
    use crate::record::LightRecord;
    use crate::thumbnail::png_bytes;

    fn project_with_point() -> ProjectRecord {
        ProjectRecord {
            name: "studio".to_string(),
            lights: vec![LightRecord {
                light_type: "Point Light 1".to_string(),
                intensity: 2.0,
                position: "[1,2,3]".to_string(),
                target_position: None,
                angle: None,
                decay: None,
                cast_shadow: true,
            }],
        }
    }

    #[test]
    fn project_load_replaces_lights() {
        let mut session = EditorSession::new();
        session.lights_mut().add_light_of(LightKind::Ambient).unwrap();
        let ticket = session.begin_request(RequestKind::Project);
        let applied = session.apply_project(&ticket, &project_with_point()).unwrap();
        assert_eq!(applied, 1);
        let light = &session.lights().lights()[0];
        assert_eq!(light.label, "Point Light 1");
        assert_eq!(
            light.params,
            LightParams::Point {
                intensity: 2.0,
                position: [1.0, 2.0, 3.0],
                cast_shadow: true
            }
        );
    }

    #[test]
    fn superseded_request_is_dropped() {
        let mut session = EditorSession::new();
        let slow = session.begin_request(RequestKind::Project);
        let fast = session.begin_request(RequestKind::Project);
        assert!(session.apply_project(&fast, &project_with_point()).is_ok());
        assert_eq!(
            session.apply_project(&slow, &ProjectRecord {
                name: "old".to_string(),
                lights: Vec::new()
            }),
            Err(SessionError::Stale(RequestKind::Project))
        );
        assert_eq!(session.lights().lights().len(), 1);
    }

    #[test]
    fn local_edit_wins_over_late_response() {
        let mut session = EditorSession::new();
        let ticket = session.begin_request(RequestKind::Project);
        session.lights_mut().add_light_of(LightKind::Spot).unwrap();
        assert!(session.apply_project(&ticket, &project_with_point()).is_err());
        assert_eq!(session.lights().count(LightKind::Spot), 1);
    }

    #[test]
    fn fabric_load_hydrates_graph_and_params() {
        let mut session = EditorSession::new();
        let payload = FabricPayload {
            fabric_name: "Tweed".to_string(),
            fabric_color: "rgb(90,80,70)".to_string(),
            maps: BTreeMap::from([
                (Slot::Diffuse, "https://cdn/t_d.png".to_string()),
                (Slot::Normal, "https://cdn/t_n.png".to_string()),
            ]),
            params: BTreeMap::from([("roughness".to_string(), ParamValue::Float(0.9))]),
        };
        let ticket = session.begin_request(RequestKind::Fabric);
        session.load_fabric(&ticket, FabricId(4), &payload).unwrap();

        assert_eq!(session.fabric_id(), Some(FabricId(4)));
        assert_eq!(session.fabric_name(), "Tweed");
        assert_eq!(session.graph().node_count(), 2);
        assert_eq!(
            session.material().binding(Slot::Normal),
            Some(&Asset::url("https://cdn/t_n.png"))
        );
        assert_eq!(
            session.material().parameter("roughness"),
            Some(&ParamValue::Float(0.9))
        );

        let snap = session.snapshot();
        assert_eq!(snap.bindings.len(), 2);
        assert_eq!(snap.fabric_color, "rgb(90,80,70)");
    }

    #[test]
    fn fabric_load_after_graph_edit_is_stale() {
        let mut session = EditorSession::new();
        let ticket = session.begin_request(RequestKind::Fabric);
        let node = session.create_source_node();
        session.attach_asset(node, Asset::url("local.png"));
        let result = session.load_fabric(&ticket, FabricId(1), &FabricPayload::default());
        assert_eq!(result, Err(SessionError::Stale(RequestKind::Fabric)));
        assert_eq!(session.graph().node_count(), 1);
    }

    #[test]
    fn attached_file_suggests_color() {
        let mut session = EditorSession::new();
        let node = session.create_source_node();
        session.attach_asset(
            node,
            Asset::file("d.png", "image/png", png_bytes(4, 4, [10, 20, 30])),
        );
        assert!(session.graph().node(node).unwrap().thumbnail.is_some());
        assert_eq!(session.suggested_color(), None);
        session.connect(node, Slot::Diffuse).unwrap();
        assert_eq!(session.suggested_color().as_deref(), Some("rgb(10,20,30)"));
    }

    #[test]
    fn clear_fabric_keeps_lights() {
        let mut session = EditorSession::new();
        session.lights_mut().add_light_of(LightKind::Point).unwrap();
        let node = session.create_source_node();
        session.attach_asset(node, Asset::url("a.png"));
        session.connect(node, Slot::AO).unwrap();
        session.set_parameter("metalness", ParamValue::Float(1.0));
        let ticket = session.begin_save();
        session.finish_save(&ticket, FabricId(2), &[]).unwrap();

        session.clear_fabric();

        assert_eq!(session.graph().node_count(), 0);
        assert!(session.material().bindings().is_empty());
        assert_eq!(
            session.material().parameter("metalness"),
            Some(&ParamValue::Float(0.5))
        );
        assert_eq!(session.fabric_id(), None);
        assert_eq!(session.lights().lights().len(), 1);
    }

    #[test]
    fn save_reply_after_new_fabric_is_ignored() {
        let mut session = EditorSession::new();
        session.set_fabric_name("linen");
        let ticket = session.begin_save();
        session.clear_fabric();
        session.set_fabric_name("wool");

        assert_eq!(
            session.finish_save(&ticket, FabricId(1), &[]),
            Err(SessionError::Replaced(FabricId(1)))
        );
        assert_eq!(session.fabric_id(), None);
        assert_eq!(session.fabric_name(), "wool");
    }

    #[test]
    fn finished_save_rebinds_uploads_without_staling_loads() {
        let mut session = EditorSession::new();
        let file = Asset::file("d.png", "image/png", png_bytes(4, 4, [50, 60, 70]));
        let node = session.create_source_node();
        session.attach_asset(node, file.clone());
        session.connect(node, Slot::Diffuse).unwrap();
        let save = session.begin_save();
        let load = session.begin_request(RequestKind::Fabric);

        let uploaded = vec![(file, "https://cdn/d.png".to_string())];
        session.finish_save(&save, FabricId(3), &uploaded).unwrap();

        assert_eq!(session.fabric_id(), Some(FabricId(3)));
        assert_eq!(
            session.material().binding(Slot::Diffuse),
            Some(&Asset::url("https://cdn/d.png"))
        );
        assert!(session.graph().node(node).unwrap().thumbnail.is_some());
        assert!(session.accepts(&load));
    }
}
