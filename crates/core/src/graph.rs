use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::asset::Asset;
use crate::material::MaterialState;
use crate::slot::{slot_from_name, Slot};
use crate::thumbnail::Thumbnail;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// A live connection from a source node into one sink slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Edge {
    pub source: NodeId,
    pub slot: Slot,
}

#[derive(Debug, Clone)]
pub struct SourceNode {
    pub id: NodeId,
    pub asset: Option<Asset>,
    pub thumbnail: Option<Thumbnail>,
    /// Slots this node currently feeds. Always mirrors the edge set.
    pub slots: BTreeSet<Slot>,
    pub position: [f32; 2],
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("unknown source node {0:?}")]
    UnknownNode(NodeId),
    #[error("Upload a map before connecting nodes.")]
    NoAssetBound(NodeId),
    #[error("unknown slot {0:?}")]
    UnknownSlot(String),
}

/// Source nodes and their edges into the material sink.
///
/// Edges are keyed by slot, so a slot can never hold more than one feeder. Every
/// mutation finishes by re-projecting the bindings into the supplied
/// [`MaterialState`].
#[derive(Debug, Clone, Default)]
pub struct MaterialGraph {
    nodes: BTreeMap<NodeId, SourceNode>,
    edges: BTreeMap<Slot, NodeId>,
    next_id: u64,
    next_pos: [f32; 2],
    revision: u64,
}

impl MaterialGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a graph from stored slot bindings: one source node per bound slot.
    pub fn hydrate(
        bindings: impl IntoIterator<Item = (Slot, Asset)>,
        material: &mut MaterialState,
    ) -> Self {
        let mut graph = Self::new();
        for (slot, asset) in bindings {
            let id = graph.alloc_node();
            if let Some(node) = graph.nodes.get_mut(&id) {
                node.asset = Some(asset);
                node.slots.insert(slot);
                node.position = [100.0, 150.0 + slot.index() as f32 * 100.0];
            }
            if let Some(previous) = graph.edges.insert(slot, id) {
                graph.remove_slot_from(previous, slot);
            }
        }
        graph.sync(material);
        graph
    }

    pub fn create_source_node(&mut self) -> NodeId {
        let id = self.alloc_node();
        tracing::debug!("created source node {:?}", id);
        id
    }

    pub fn attach_asset(&mut self, node: NodeId, asset: Asset, material: &mut MaterialState) {
        let Some(entry) = self.nodes.get_mut(&node) else {
            tracing::debug!("attach ignored for unknown node {:?}", node);
            return;
        };
        entry.asset = Some(asset);
        entry.thumbnail = None;
        self.revision += 1;
        self.sync(material);
    }

    /// Points every node holding `file` at `url` instead. Thumbnails stay cached
    /// and the structural revision does not move. Returns the nodes rebound.
    pub fn rebind_asset(
        &mut self,
        file: &Asset,
        url: &str,
        material: &mut MaterialState,
    ) -> usize {
        let mut rebound = 0;
        for entry in self.nodes.values_mut() {
            if entry.asset.as_ref() == Some(file) {
                entry.asset = Some(Asset::url(url));
                rebound += 1;
            }
        }
        if rebound > 0 {
            self.sync(material);
        }
        rebound
    }

    pub fn set_thumbnail(&mut self, node: NodeId, thumbnail: Thumbnail) -> bool {
        match self.nodes.get_mut(&node) {
            Some(entry) => {
                entry.thumbnail = Some(thumbnail);
                true
            }
            None => false,
        }
    }

    pub fn set_position(&mut self, node: NodeId, position: [f32; 2]) {
        if let Some(entry) = self.nodes.get_mut(&node) {
            entry.position = position;
        }
    }

    pub fn connect(
        &mut self,
        node: NodeId,
        slot: Slot,
        material: &mut MaterialState,
    ) -> Result<Edge, ConnectionError> {
        let entry = self
            .nodes
            .get(&node)
            .ok_or(ConnectionError::UnknownNode(node))?;
        if entry.asset.is_none() {
            return Err(ConnectionError::NoAssetBound(node));
        }

        let edge = Edge { source: node, slot };
        match self.edges.get(&slot).copied() {
            Some(current) if current == node => return Ok(edge),
            Some(current) => {
                tracing::debug!("slot {} evicts feeder {:?}", slot, current);
                self.remove_slot_from(current, slot);
            }
            None => {}
        }

        self.edges.insert(slot, node);
        if let Some(entry) = self.nodes.get_mut(&node) {
            entry.slots.insert(slot);
        }
        self.revision += 1;
        self.sync(material);
        Ok(edge)
    }

    pub fn connect_named(
        &mut self,
        node: NodeId,
        slot_name: &str,
        material: &mut MaterialState,
    ) -> Result<Edge, ConnectionError> {
        let slot = slot_from_name(slot_name)
            .ok_or_else(|| ConnectionError::UnknownSlot(slot_name.to_string()))?;
        self.connect(node, slot, material)
    }

    pub fn disconnect(&mut self, edge: Edge, material: &mut MaterialState) {
        if self.edges.get(&edge.slot) != Some(&edge.source) {
            return;
        }
        self.edges.remove(&edge.slot);
        self.remove_slot_from(edge.source, edge.slot);
        self.revision += 1;
        self.sync(material);
    }

    pub fn delete_source_node(&mut self, node: NodeId, material: &mut MaterialState) {
        if !self.nodes.contains_key(&node) {
            return;
        }
        self.edges.retain(|_, source| *source != node);
        self.nodes.remove(&node);
        self.revision += 1;
        self.sync(material);
        tracing::debug!("deleted source node {:?}", node);
    }

    pub fn node(&self, id: NodeId) -> Option<&SourceNode> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &SourceNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.edges
            .iter()
            .map(|(slot, source)| Edge {
                source: *source,
                slot: *slot,
            })
    }

    pub fn edges_from(&self, node: NodeId) -> Vec<Edge> {
        self.edges().filter(|edge| edge.source == node).collect()
    }

    pub fn feeder(&self, slot: Slot) -> Option<NodeId> {
        self.edges.get(&slot).copied()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Counts structural edits (edges, nodes, assets).
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn project(&self) -> BTreeMap<Slot, Asset> {
        project(&self.nodes, &self.edges)
    }

    fn sync(&self, material: &mut MaterialState) {
        material.sync_bindings(&self.project());
    }

    fn remove_slot_from(&mut self, node: NodeId, slot: Slot) {
        if let Some(entry) = self.nodes.get_mut(&node) {
            entry.slots.remove(&slot);
        }
    }

    fn alloc_node(&mut self) -> NodeId {
        self.next_id += 1;
        let id = NodeId(self.next_id);
        let position = self.advance_pos();
        self.nodes.insert(
            id,
            SourceNode {
                id,
                asset: None,
                thumbnail: None,
                slots: BTreeSet::new(),
                position,
            },
        );
        self.revision += 1;
        id
    }

    fn advance_pos(&mut self) -> [f32; 2] {
        if self.next_pos == [0.0, 0.0] {
            self.next_pos = [100.0, 50.0];
        }
        let pos = self.next_pos;
        self.next_pos[0] += 125.0;
        if self.next_pos[0] > 350.0 {
            self.next_pos[0] = 100.0;
            self.next_pos[1] += 125.0;
            if self.next_pos[1] > 300.0 {
                self.next_pos[1] = 50.0;
            }
        }
        pos
    }
}

/// Slot bindings implied by an edge set: each slot maps to its feeder's asset.
pub fn project(
    nodes: &BTreeMap<NodeId, SourceNode>,
    edges: &BTreeMap<Slot, NodeId>,
) -> BTreeMap<Slot, Asset> {
    edges
        .iter()
        .filter_map(|(slot, source)| {
            let asset = nodes.get(source)?.asset.clone()?;
            Some((*slot, asset))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_with_asset(
        graph: &mut MaterialGraph,
        material: &mut MaterialState,
        name: &str,
    ) -> NodeId {
        let id = graph.create_source_node();
        graph.attach_asset(id, Asset::url(name), material);
        id
    }

    fn assert_consistent(graph: &MaterialGraph, material: &MaterialState) {
        for node in graph.nodes() {
            let from_edges: BTreeSet<Slot> =
                graph.edges_from(node.id).iter().map(|e| e.slot).collect();
            assert_eq!(node.slots, from_edges);
        }
        assert_eq!(&graph.project(), material.bindings());
    }

    #[test]
    fn create_node_has_no_side_effects() {
        let mut graph = MaterialGraph::new();
        let material = MaterialState::new();
        let rev = material.revision();
        let id = graph.create_source_node();
        let node = graph.node(id).unwrap();
        assert!(node.asset.is_none());
        assert!(node.slots.is_empty());
        assert!((100.0..=350.0).contains(&node.position[0]));
        assert!((50.0..=300.0).contains(&node.position[1]));
        assert_eq!(material.revision(), rev);
        assert!(material.bindings().is_empty());
    }

    #[test]
    fn connect_without_asset_is_rejected() {
        let mut graph = MaterialGraph::new();
        let mut material = MaterialState::new();
        let id = graph.create_source_node();
        let rev = graph.revision();
        let err = graph.connect(id, Slot::Diffuse, &mut material).unwrap_err();
        assert_eq!(err, ConnectionError::NoAssetBound(id));
        assert_eq!(graph.edges().count(), 0);
        assert_eq!(graph.revision(), rev);
        assert!(material.bindings().is_empty());
    }

    #[test]
    fn connect_unknown_slot_or_node() {
        let mut graph = MaterialGraph::new();
        let mut material = MaterialState::new();
        let id = node_with_asset(&mut graph, &mut material, "a.png");
        assert_eq!(
            graph.connect_named(id, "Sheen", &mut material),
            Err(ConnectionError::UnknownSlot("Sheen".to_string()))
        );
        let ghost = NodeId(99);
        assert_eq!(
            graph.connect(ghost, Slot::AO, &mut material),
            Err(ConnectionError::UnknownNode(ghost))
        );
        assert!(graph.connect_named(id, "AO", &mut material).is_ok());
        assert_eq!(material.binding(Slot::AO), Some(&Asset::url("a.png")));
    }

    #[test]
    fn later_feeder_evicts_earlier() {
        let mut graph = MaterialGraph::new();
        let mut material = MaterialState::new();
        let a = node_with_asset(&mut graph, &mut material, "a.png");
        let b = node_with_asset(&mut graph, &mut material, "b.png");

        graph.connect(a, Slot::Normal, &mut material).unwrap();
        graph.connect(b, Slot::Normal, &mut material).unwrap();

        let edges: Vec<Edge> = graph.edges().collect();
        assert_eq!(
            edges,
            vec![Edge {
                source: b,
                slot: Slot::Normal
            }]
        );
        assert_eq!(material.binding(Slot::Normal), Some(&Asset::url("b.png")));
        assert!(!graph.node(a).unwrap().slots.contains(&Slot::Normal));
        assert_consistent(&graph, &material);
    }

    #[test]
    fn one_asset_can_feed_many_slots() {
        let mut graph = MaterialGraph::new();
        let mut material = MaterialState::new();
        let a = node_with_asset(&mut graph, &mut material, "a.png");
        graph.connect(a, Slot::Roughness, &mut material).unwrap();
        graph.connect(a, Slot::Metalness, &mut material).unwrap();
        assert_eq!(graph.node(a).unwrap().slots.len(), 2);
        assert_eq!(material.bindings().len(), 2);
        assert_consistent(&graph, &material);
    }

    #[test]
    fn delete_clears_only_its_slots() {
        let mut graph = MaterialGraph::new();
        let mut material = MaterialState::new();
        let a = node_with_asset(&mut graph, &mut material, "a.png");
        let b = node_with_asset(&mut graph, &mut material, "b.png");
        graph.connect(a, Slot::Bump, &mut material).unwrap();
        graph.connect(a, Slot::Displacement, &mut material).unwrap();
        graph.connect(b, Slot::Diffuse, &mut material).unwrap();

        graph.delete_source_node(a, &mut material);

        assert!(graph.node(a).is_none());
        assert!(material.binding(Slot::Bump).is_none());
        assert!(material.binding(Slot::Displacement).is_none());
        assert_eq!(material.binding(Slot::Diffuse), Some(&Asset::url("b.png")));
        assert_eq!(graph.edges().count(), 1);
        assert_consistent(&graph, &material);
    }

    #[test]
    fn disconnect_and_connect_are_idempotent() {
        let mut graph = MaterialGraph::new();
        let mut material = MaterialState::new();
        let a = node_with_asset(&mut graph, &mut material, "a.png");

        let first = graph.connect(a, Slot::Opacity, &mut material).unwrap();
        let rev = material.revision();
        let second = graph.connect(a, Slot::Opacity, &mut material).unwrap();
        assert_eq!(first, second);
        assert_eq!(graph.edges().count(), 1);
        assert_eq!(material.revision(), rev);

        graph.disconnect(first, &mut material);
        let graph_rev = graph.revision();
        graph.disconnect(first, &mut material);
        assert_eq!(graph.revision(), graph_rev);
        assert_eq!(graph.edges().count(), 0);
        assert!(material.binding(Slot::Opacity).is_none());
        assert!(graph.node(a).unwrap().slots.is_empty());
    }

    #[test]
    fn stale_edge_does_not_clear_new_feeder() {
        let mut graph = MaterialGraph::new();
        let mut material = MaterialState::new();
        let a = node_with_asset(&mut graph, &mut material, "a.png");
        let b = node_with_asset(&mut graph, &mut material, "b.png");
        let old = graph.connect(a, Slot::Specular, &mut material).unwrap();
        graph.connect(b, Slot::Specular, &mut material).unwrap();

        graph.disconnect(old, &mut material);

        assert_eq!(graph.feeder(Slot::Specular), Some(b));
        assert_eq!(material.binding(Slot::Specular), Some(&Asset::url("b.png")));
    }

    #[test]
    fn reattach_refreshes_fed_slots() {
        let mut graph = MaterialGraph::new();
        let mut material = MaterialState::new();
        let a = node_with_asset(&mut graph, &mut material, "old.png");
        graph.connect(a, Slot::Diffuse, &mut material).unwrap();
        graph.connect(a, Slot::Emissive, &mut material).unwrap();

        graph.attach_asset(a, Asset::url("new.png"), &mut material);

        assert_eq!(material.binding(Slot::Diffuse), Some(&Asset::url("new.png")));
        assert_eq!(material.binding(Slot::Emissive), Some(&Asset::url("new.png")));
        assert_consistent(&graph, &material);
    }

    #[test]
    fn attach_to_unknown_node_is_noop() {
        let mut graph = MaterialGraph::new();
        let mut material = MaterialState::new();
        let rev = graph.revision();
        graph.attach_asset(NodeId(7), Asset::url("x.png"), &mut material);
        assert_eq!(graph.revision(), rev);
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn rebind_swaps_file_for_url_in_every_slot() {
        let mut graph = MaterialGraph::new();
        let mut material = MaterialState::new();
        let file = Asset::file("w_d.png", "image/png", vec![7, 7, 7]);
        let node = graph.create_source_node();
        graph.attach_asset(node, file.clone(), &mut material);
        graph.connect(node, Slot::Diffuse, &mut material).unwrap();
        graph.connect(node, Slot::Emissive, &mut material).unwrap();
        let other = node_with_asset(&mut graph, &mut material, "https://cdn/n.png");
        graph.connect(other, Slot::Normal, &mut material).unwrap();
        let revision = graph.revision();

        assert_eq!(graph.rebind_asset(&file, "https://cdn/w_d.png", &mut material), 1);

        assert_eq!(graph.revision(), revision);
        assert_eq!(
            material.binding(Slot::Emissive),
            Some(&Asset::url("https://cdn/w_d.png"))
        );
        assert_eq!(
            material.binding(Slot::Normal),
            Some(&Asset::url("https://cdn/n.png"))
        );
        assert_eq!(graph.rebind_asset(&file, "https://cdn/again.png", &mut material), 0);
        assert_consistent(&graph, &material);
    }

    #[test]
    fn slot_has_single_feeder_after_mixed_edits() {
        let mut graph = MaterialGraph::new();
        let mut material = MaterialState::new();
        let ids: Vec<NodeId> = (0..4)
            .map(|i| node_with_asset(&mut graph, &mut material, &format!("{i}.png")))
            .collect();
        for (step, slot) in Slot::ALL.iter().cycle().take(40).enumerate() {
            let node = ids[step % ids.len()];
            match step % 5 {
                0..=2 => {
                    let _ = graph.connect(node, *slot, &mut material);
                }
                3 => {
                    let first = graph.edges().next();
                    if let Some(edge) = first {
                        graph.disconnect(edge, &mut material);
                    }
                }
                _ => {
                    graph.attach_asset(node, Asset::url(format!("r{step}.png")), &mut material);
                }
            }
            let mut seen = BTreeSet::new();
            for edge in graph.edges() {
                assert!(seen.insert(edge.slot));
            }
            assert_consistent(&graph, &material);
        }
        graph.delete_source_node(ids[0], &mut material);
        assert_consistent(&graph, &material);
    }

    #[test]
    fn hydrate_builds_one_node_per_binding() {
        let mut material = MaterialState::new();
        let graph = MaterialGraph::hydrate(
            [
                (Slot::Diffuse, Asset::url("https://cdn/d.png")),
                (Slot::Roughness, Asset::url("https://cdn/r.png")),
            ],
            &mut material,
        );
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edges().count(), 2);
        assert_eq!(
            material.binding(Slot::Roughness),
            Some(&Asset::url("https://cdn/r.png"))
        );
        assert_consistent(&graph, &material);
    }
}
