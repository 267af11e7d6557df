use std::collections::HashMap;
use std::path::Path;

use egui::{Pos2, Ui};
use egui_snarl::ui::{PinInfo, SnarlViewer};
use egui_snarl::Snarl;
use rfd::FileDialog;

use loom_core::{Asset, EditorSession, Edge, NodeId, Slot, SINK_LABEL};

use super::menu::{source_menu_items, NodeAction, IMAGE_EXTENSIONS};
use super::utils::{average_color32, slot_color, thumbnail_image};
use super::{GraphEvents, SnarlNode};

const THUMB_DISPLAY: f32 = 48.0;

pub(super) struct NodeGraphViewer<'a> {
    pub(super) session: &'a mut EditorSession,
    pub(super) core_to_snarl: &'a mut HashMap<NodeId, egui_snarl::NodeId>,
    pub(super) snarl_to_core: &'a mut HashMap<egui_snarl::NodeId, NodeId>,
    pub(super) thumbnails: &'a mut HashMap<NodeId, egui::TextureHandle>,
    pub(super) selected_node: &'a mut Option<NodeId>,
    pub(super) events: GraphEvents,
}

impl NodeGraphViewer<'_> {
    fn source_id(&self, snarl: &Snarl<SnarlNode>, node: egui_snarl::NodeId) -> Option<NodeId> {
        match snarl.get_node(node)? {
            SnarlNode::Source(id) => Some(*id),
            SnarlNode::Sink => None,
        }
    }

    fn is_sink(&self, snarl: &Snarl<SnarlNode>, node: egui_snarl::NodeId) -> bool {
        matches!(snarl.get_node(node), Some(SnarlNode::Sink))
    }

    fn disconnect_slot(&mut self, source: NodeId, slot: Slot) {
        self.session.disconnect(Edge { source, slot });
        self.events.changed = true;
    }

    fn attach_from_path(&mut self, node: NodeId, path: &Path) {
        match Asset::from_path(path) {
            Ok(asset) => {
                tracing::info!("attached {} to {:?}", asset.label(), node);
                self.session.attach_asset(node, asset);
                self.thumbnails.remove(&node);
                self.events.changed = true;
            }
            Err(err) => {
                let message = format!("failed to read {}: {}", path.display(), err);
                tracing::error!("{}", message);
                self.events.errors.push(message);
            }
        }
    }

    fn thumbnail_texture(&mut self, ui: &Ui, node: NodeId) -> Option<egui::TextureId> {
        if let Some(texture) = self.thumbnails.get(&node) {
            return Some(texture.id());
        }
        let thumbnail = self.session.graph().node(node)?.thumbnail.as_ref()?;
        let texture = ui.ctx().load_texture(
            format!("thumbnail-{}", node.raw()),
            thumbnail_image(thumbnail),
            egui::TextureOptions::LINEAR,
        );
        let id = texture.id();
        self.thumbnails.insert(node, texture);
        Some(id)
    }
}

impl SnarlViewer<SnarlNode> for NodeGraphViewer<'_> {
    fn title(&mut self, node: &SnarlNode) -> String {
        match node {
            SnarlNode::Sink => SINK_LABEL.to_string(),
            SnarlNode::Source(id) => match self.session.graph().node(*id) {
                Some(source) => match &source.asset {
                    Some(asset) => asset.label().to_string(),
                    None => format!("Texture {}", id.raw()),
                },
                None => "Missing".to_string(),
            },
        }
    }

    fn show_header(
        &mut self,
        node: egui_snarl::NodeId,
        _inputs: &[egui_snarl::InPin],
        _outputs: &[egui_snarl::OutPin],
        ui: &mut Ui,
        snarl: &mut Snarl<SnarlNode>,
    ) {
        let title = self.title(&snarl[node]);
        ui.label(title);
    }

    fn inputs(&mut self, node: &SnarlNode) -> usize {
        match node {
            SnarlNode::Sink => Slot::ALL.len(),
            SnarlNode::Source(_) => 0,
        }
    }

    fn outputs(&mut self, node: &SnarlNode) -> usize {
        match node {
            SnarlNode::Sink => 0,
            SnarlNode::Source(_) => 1,
        }
    }

    fn show_input(
        &mut self,
        pin: &egui_snarl::InPin,
        ui: &mut Ui,
        _snarl: &mut Snarl<SnarlNode>,
    ) -> impl egui_snarl::ui::SnarlPin + 'static {
        match Slot::from_index(pin.id.input) {
            Some(slot) => {
                ui.label(slot.name());
                PinInfo::circle().with_fill(slot_color(slot))
            }
            None => {
                ui.label("?");
                PinInfo::circle()
            }
        }
    }

    fn show_output(
        &mut self,
        pin: &egui_snarl::OutPin,
        ui: &mut Ui,
        snarl: &mut Snarl<SnarlNode>,
    ) -> impl egui_snarl::ui::SnarlPin + 'static {
        let Some(core_id) = self.source_id(snarl, pin.id.node) else {
            ui.label("?");
            return PinInfo::circle();
        };

        let (has_asset, swatch) = match self.session.graph().node(core_id) {
            Some(source) => (
                source.asset.is_some(),
                source.thumbnail.as_ref().map(average_color32),
            ),
            None => (false, None),
        };

        ui.vertical(|ui| {
            if let Some(texture) = self.thumbnail_texture(ui, core_id) {
                ui.add(egui::Image::new(egui::load::SizedTexture::new(
                    texture,
                    egui::vec2(THUMB_DISPLAY, THUMB_DISPLAY),
                )));
            } else if has_asset {
                ui.label("remote map");
            } else {
                ui.label("no map");
            }
            let feeds = self
                .session
                .graph()
                .edges_from(core_id)
                .iter()
                .map(|edge| edge.slot.name())
                .collect::<Vec<_>>()
                .join(", ");
            if !feeds.is_empty() {
                ui.small(feeds);
            }
        });

        let pin_info = PinInfo::circle();
        match swatch {
            Some(color) => pin_info.with_fill(color),
            None if has_asset => pin_info.with_fill(egui::Color32::from_rgb(200, 200, 200)),
            None => pin_info.with_fill(egui::Color32::from_rgb(90, 90, 90)),
        }
    }

    fn has_graph_menu(&mut self, _pos: Pos2, _snarl: &mut Snarl<SnarlNode>) -> bool {
        true
    }

    fn show_graph_menu(&mut self, pos: Pos2, ui: &mut Ui, snarl: &mut Snarl<SnarlNode>) {
        if ui.button("Add texture node").clicked() {
            let core_id = self.session.create_source_node();
            self.session.set_node_position(core_id, [pos.x, pos.y]);
            let snarl_id = snarl.insert_node(pos, SnarlNode::Source(core_id));
            self.core_to_snarl.insert(core_id, snarl_id);
            self.snarl_to_core.insert(snarl_id, core_id);
            self.events.changed = true;
            ui.close();
        }
    }

    fn has_node_menu(&mut self, node: &SnarlNode) -> bool {
        matches!(node, SnarlNode::Source(_))
    }

    fn show_node_menu(
        &mut self,
        node: egui_snarl::NodeId,
        _inputs: &[egui_snarl::InPin],
        _outputs: &[egui_snarl::OutPin],
        ui: &mut Ui,
        snarl: &mut Snarl<SnarlNode>,
    ) {
        let Some(core_id) = self.source_id(snarl, node) else {
            return;
        };
        for item in source_menu_items() {
            if !ui.button(item.name).clicked() {
                continue;
            }
            match item.action {
                NodeAction::AttachFile => {
                    if let Some(path) = FileDialog::new()
                        .add_filter("Texture", &IMAGE_EXTENSIONS)
                        .pick_file()
                    {
                        self.attach_from_path(core_id, &path);
                    }
                }
                NodeAction::Disconnect => {
                    for edge in self.session.graph().edges_from(core_id) {
                        self.disconnect_slot(edge.source, edge.slot);
                    }
                }
                NodeAction::Delete => {
                    self.session.delete_source_node(core_id);
                    self.core_to_snarl.remove(&core_id);
                    self.snarl_to_core.remove(&node);
                    self.thumbnails.remove(&core_id);
                    let _ = snarl.remove_node(node);
                    if self.selected_node.as_ref() == Some(&core_id) {
                        *self.selected_node = None;
                    }
                    self.events.changed = true;
                }
            }
            ui.close();
            break;
        }
    }

    fn final_node_rect(
        &mut self,
        node: egui_snarl::NodeId,
        ui_rect: egui::Rect,
        ui: &mut Ui,
        snarl: &mut Snarl<SnarlNode>,
    ) {
        let Some(core_id) = self.source_id(snarl, node) else {
            return;
        };
        if self.selected_node.as_ref() == Some(&core_id) {
            let stroke = egui::Stroke::new(2.0, egui::Color32::from_rgb(235, 200, 60));
            ui.painter()
                .rect_stroke(ui_rect, 6.0, stroke, egui::StrokeKind::Inside);
        }

        let response = ui.interact(
            ui_rect,
            ui.make_persistent_id(("node-select", node)),
            egui::Sense::click(),
        );
        if response.clicked_by(egui::PointerButton::Primary) {
            *self.selected_node = Some(core_id);
        }
    }

    fn connect(
        &mut self,
        from: &egui_snarl::OutPin,
        to: &egui_snarl::InPin,
        snarl: &mut Snarl<SnarlNode>,
    ) {
        let Some(source) = self.source_id(snarl, from.id.node) else {
            return;
        };
        if !self.is_sink(snarl, to.id.node) {
            return;
        }
        let Some(slot) = Slot::from_index(to.id.input) else {
            return;
        };

        match self.session.connect(source, slot) {
            Ok(_) => {
                snarl.drop_inputs(to.id);
                let _ = snarl.connect(from.id, to.id);
                self.events.changed = true;
            }
            Err(err) => {
                tracing::warn!("connection rejected: {}", err);
                self.events.errors.push(err.to_string());
            }
        }
    }

    fn disconnect(
        &mut self,
        from: &egui_snarl::OutPin,
        to: &egui_snarl::InPin,
        snarl: &mut Snarl<SnarlNode>,
    ) {
        let Some(source) = self.source_id(snarl, from.id.node) else {
            return;
        };
        if let Some(slot) = Slot::from_index(to.id.input) {
            self.disconnect_slot(source, slot);
        }
        let _ = snarl.disconnect(from.id, to.id);
    }

    fn drop_outputs(&mut self, pin: &egui_snarl::OutPin, snarl: &mut Snarl<SnarlNode>) {
        if let Some(source) = self.source_id(snarl, pin.id.node) {
            for edge in self.session.graph().edges_from(source) {
                self.disconnect_slot(edge.source, edge.slot);
            }
        }
        snarl.drop_outputs(pin.id);
    }

    fn drop_inputs(&mut self, pin: &egui_snarl::InPin, snarl: &mut Snarl<SnarlNode>) {
        if self.is_sink(snarl, pin.id.node) {
            if let Some(slot) = Slot::from_index(pin.id.input) {
                if let Some(source) = self.session.graph().feeder(slot) {
                    self.disconnect_slot(source, slot);
                }
            }
        }
        snarl.drop_inputs(pin.id);
    }
}
