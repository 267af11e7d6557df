use std::collections::{HashMap, HashSet};

use egui::{vec2, Color32, Frame, Pos2, Stroke, Ui};
use egui_snarl::ui::{BackgroundPattern, SnarlStyle};
use egui_snarl::{InPinId, OutPinId, Snarl};

use loom_core::{EditorSession, MaterialGraph, NodeId};

mod menu;
mod utils;
mod viewer;

use viewer::NodeGraphViewer;

const SINK_POS: Pos2 = Pos2::new(600.0, 60.0);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SnarlNode {
    Sink,
    Source(NodeId),
}

/// What happened in the graph widget during one frame.
#[derive(Default)]
pub(crate) struct GraphEvents {
    pub(crate) changed: bool,
    pub(crate) errors: Vec<String>,
}

pub struct NodeGraphState {
    snarl: Snarl<SnarlNode>,
    sink: Option<egui_snarl::NodeId>,
    core_to_snarl: HashMap<NodeId, egui_snarl::NodeId>,
    snarl_to_core: HashMap<egui_snarl::NodeId, NodeId>,
    thumbnails: HashMap<NodeId, egui::TextureHandle>,
    needs_wire_sync: bool,
    selected_node: Option<NodeId>,
}

impl Default for NodeGraphState {
    fn default() -> Self {
        Self {
            snarl: Snarl::new(),
            sink: None,
            core_to_snarl: HashMap::new(),
            snarl_to_core: HashMap::new(),
            thumbnails: HashMap::new(),
            needs_wire_sync: true,
            selected_node: None,
        }
    }
}

impl NodeGraphState {
    /// Drops every widget node; the next frame rebuilds from the session.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn selected_node_id(&self) -> Option<NodeId> {
        self.selected_node
    }

    pub(crate) fn show(&mut self, ui: &mut Ui, session: &mut EditorSession) -> GraphEvents {
        self.ensure_nodes(session.graph());
        if self.needs_wire_sync {
            self.sync_wires(session.graph());
            self.needs_wire_sync = false;
        }

        let mut viewer = NodeGraphViewer {
            session,
            core_to_snarl: &mut self.core_to_snarl,
            snarl_to_core: &mut self.snarl_to_core,
            thumbnails: &mut self.thumbnails,
            selected_node: &mut self.selected_node,
            events: GraphEvents::default(),
        };
        let style = SnarlStyle {
            pin_size: Some(10.0),
            bg_frame: Some(Frame::NONE.fill(Color32::from_rgb(18, 18, 18))),
            bg_pattern: Some(BackgroundPattern::grid(vec2(64.0, 64.0), 0.0)),
            bg_pattern_stroke: Some(Stroke::new(1.0, Color32::from_rgb(26, 26, 26))),
            ..SnarlStyle::default()
        };
        self.snarl.show(&mut viewer, &style, "material_graph", ui);

        let events = viewer.events;
        if events.changed {
            self.needs_wire_sync = true;
        }
        events
    }

    fn ensure_nodes(&mut self, graph: &MaterialGraph) {
        if self.sink.is_none() {
            self.sink = Some(self.snarl.insert_node(SINK_POS, SnarlNode::Sink));
            self.needs_wire_sync = true;
        }

        for node in graph.nodes() {
            if self.core_to_snarl.contains_key(&node.id) {
                continue;
            }
            let pos = Pos2::new(node.position[0], node.position[1]);
            let snarl_id = self.snarl.insert_node(pos, SnarlNode::Source(node.id));
            self.core_to_snarl.insert(node.id, snarl_id);
            self.snarl_to_core.insert(snarl_id, node.id);
            self.needs_wire_sync = true;
        }

        let stale: Vec<_> = self
            .snarl_to_core
            .iter()
            .filter(|(_, core_id)| graph.node(**core_id).is_none())
            .map(|(snarl_id, _)| *snarl_id)
            .collect();
        for snarl_id in stale {
            if let Some(core_id) = self.snarl_to_core.remove(&snarl_id) {
                self.core_to_snarl.remove(&core_id);
                self.thumbnails.remove(&core_id);
            }
            let _ = self.snarl.remove_node(snarl_id);
            self.needs_wire_sync = true;
        }

        if let Some(selected) = self.selected_node {
            if graph.node(selected).is_none() {
                self.selected_node = None;
            }
        }
    }

    /// Makes the widget's wires match the graph's edges exactly.
    fn sync_wires(&mut self, graph: &MaterialGraph) {
        let Some(sink) = self.sink else {
            return;
        };
        let mut desired = HashSet::new();
        for edge in graph.edges() {
            if let Some(source) = self.core_to_snarl.get(&edge.source) {
                desired.insert((
                    OutPinId {
                        node: *source,
                        output: 0,
                    },
                    InPinId {
                        node: sink,
                        input: edge.slot.index(),
                    },
                ));
            }
        }

        let existing: Vec<_> = self.snarl.wires().collect();
        for (out_pin, in_pin) in existing {
            if !desired.contains(&(out_pin, in_pin)) {
                let _ = self.snarl.disconnect(out_pin, in_pin);
            }
        }

        for (out_pin, in_pin) in desired {
            let _ = self.snarl.connect(out_pin, in_pin);
        }
    }

    pub(crate) fn wire_count(&self) -> usize {
        self.snarl.wires().count()
    }
}
