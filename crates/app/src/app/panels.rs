use egui::Ui;

use loom_core::{
    parameter_specs, EditorSession, LightId, LightKind, LightParams, LightState, LightUpdate,
    ParamSpec, ParamValue,
};

use super::notices::Notices;

/// Fabric name, color and material parameter controls.
pub(super) fn show_parameters(ui: &mut Ui, session: &mut EditorSession) {
    let mut name = session.fabric_name().to_string();
    if param_row(ui, "fabricName", |ui| {
        ui.add_sized(
            [ui.available_width().max(160.0), ui.spacing().interact_size.y],
            egui::TextEdit::singleline(&mut name),
        )
        .changed()
    }) {
        session.set_fabric_name(name);
    }

    let mut color = session.fabric_color().to_string();
    let suggested = session.suggested_color();
    if param_row(ui, "fabricColor", |ui| {
        let mut edited = ui
            .add_sized([120.0, ui.spacing().interact_size.y], egui::TextEdit::singleline(&mut color))
            .changed();
        if let Some(suggested) = &suggested {
            if ui
                .button("From diffuse")
                .on_hover_text(suggested.as_str())
                .clicked()
            {
                color = suggested.clone();
                edited = true;
            }
        }
        edited
    }) {
        session.set_fabric_color(color);
    }

    ui.separator();

    for spec in parameter_specs() {
        let current = session
            .material()
            .parameter(spec.name)
            .cloned()
            .unwrap_or_else(|| spec.default.clone());
        let (next, did_change) = edit_param(ui, &spec, current);
        if did_change {
            session.set_parameter(spec.name, next);
        }
    }

    if ui.button("Reset parameters").clicked() {
        for spec in parameter_specs() {
            session.set_parameter(spec.name, spec.default);
        }
    }
}

fn edit_param(ui: &mut Ui, spec: &ParamSpec, value: ParamValue) -> (ParamValue, bool) {
    let range = spec.range.0..=spec.range.1;
    match value {
        ParamValue::Float(mut v) => {
            let changed = param_row(ui, spec.name, |ui| {
                let mut changed = false;
                let height = ui.spacing().interact_size.y;
                if ui
                    .add_sized(
                        [72.0, height],
                        egui::DragValue::new(&mut v)
                            .speed(spec.step)
                            .range(range.clone()),
                    )
                    .changed()
                {
                    changed = true;
                }
                ui.add_space(8.0);
                let slider_width = ui.available_width().max(120.0);
                if ui
                    .add_sized(
                        [slider_width, height],
                        egui::Slider::new(&mut v, range.clone())
                            .step_by(f64::from(spec.step))
                            .show_value(false),
                    )
                    .changed()
                {
                    changed = true;
                }
                changed
            });
            (ParamValue::Float(v), changed)
        }
        ParamValue::Bool(mut v) => {
            let changed = param_row(ui, spec.name, |ui| {
                ui.add(egui::Checkbox::without_text(&mut v)).changed()
            });
            (ParamValue::Bool(v), changed)
        }
        ParamValue::Vec2(mut v) => {
            let changed = param_row(ui, spec.name, |ui| {
                let mut changed = false;
                let height = ui.spacing().interact_size.y;
                for idx in 0..2 {
                    if ui
                        .add_sized(
                            [72.0, height],
                            egui::DragValue::new(&mut v[idx])
                                .speed(spec.step)
                                .range(range.clone()),
                        )
                        .changed()
                    {
                        changed = true;
                    }
                    if idx < 1 {
                        ui.add_space(8.0);
                    }
                }
                changed
            });
            (ParamValue::Vec2(v), changed)
        }
        ParamValue::Color(hex) => {
            let mut rgb = parse_hex_color(&hex).unwrap_or([255, 255, 255]);
            let changed = param_row(ui, spec.name, |ui| {
                ui.color_edit_button_srgb(&mut rgb).changed()
            });
            if changed {
                (ParamValue::Color(hex_color(rgb)), true)
            } else {
                (ParamValue::Color(hex), false)
            }
        }
    }
}

/// Light type selector, add button and one editor per light.
pub(super) fn show_lights(ui: &mut Ui, lights: &mut LightState, notices: &mut Notices) {
    ui.horizontal(|ui| {
        let mut selected = lights.selected_kind();
        egui::ComboBox::from_id_salt("light_kind")
            .selected_text(selected.name())
            .show_ui(ui, |ui| {
                for kind in LightKind::ALL {
                    ui.selectable_value(&mut selected, kind, kind.name());
                }
            });
        if selected != lights.selected_kind() {
            lights.select_kind(selected);
        }
        if ui.button("Add light").clicked() {
            if let Err(err) = lights.add_light() {
                notices.error(err.to_string());
            }
        }
    });
    ui.label(format!("{} lights", lights.lights().len()));
    ui.separator();

    let mut deleted: Option<LightId> = None;
    let mut updates: Vec<(LightId, LightUpdate)> = Vec::new();
    for light in lights.lights() {
        egui::CollapsingHeader::new(light.label.as_str())
            .id_salt(light.id.0)
            .default_open(false)
            .show(ui, |ui| {
                let update = light_controls(ui, &light.params);
                if update != LightUpdate::default() {
                    updates.push((light.id, update));
                }
                if let Some(direction) = light.direction() {
                    ui.label(format!(
                        "direction {:.2} {:.2} {:.2}",
                        direction.x, direction.y, direction.z
                    ));
                }
                if ui.button("Delete light").clicked() {
                    deleted = Some(light.id);
                }
            });
    }

    for (id, update) in updates {
        lights.update_light(id, &update);
    }
    if let Some(id) = deleted {
        lights.delete_light(id);
    }
}

fn light_controls(ui: &mut Ui, params: &LightParams) -> LightUpdate {
    let mut update = LightUpdate::default();
    match params.clone() {
        LightParams::Ambient { mut intensity } | LightParams::Hemisphere { mut intensity } => {
            if drag_row(ui, "intensity", &mut intensity, 0.05) {
                update.intensity = Some(intensity);
            }
        }
        LightParams::Directional {
            mut intensity,
            mut position,
            mut target_position,
            mut cast_shadow,
        } => {
            if drag_row(ui, "intensity", &mut intensity, 0.05) {
                update.intensity = Some(intensity);
            }
            if vec3_row(ui, "position", &mut position) {
                update.position = Some(position);
            }
            if vec3_row(ui, "target", &mut target_position) {
                update.target_position = Some(target_position);
            }
            if ui.checkbox(&mut cast_shadow, "castShadow").changed() {
                update.cast_shadow = Some(cast_shadow);
            }
        }
        LightParams::Point {
            mut intensity,
            mut position,
            mut cast_shadow,
        } => {
            if drag_row(ui, "intensity", &mut intensity, 0.05) {
                update.intensity = Some(intensity);
            }
            if vec3_row(ui, "position", &mut position) {
                update.position = Some(position);
            }
            if ui.checkbox(&mut cast_shadow, "castShadow").changed() {
                update.cast_shadow = Some(cast_shadow);
            }
        }
        LightParams::Spot {
            mut intensity,
            mut position,
            mut angle,
            mut decay,
            mut cast_shadow,
        } => {
            if drag_row(ui, "intensity", &mut intensity, 0.05) {
                update.intensity = Some(intensity);
            }
            if vec3_row(ui, "position", &mut position) {
                update.position = Some(position);
            }
            if drag_row(ui, "angle", &mut angle, 0.01) {
                update.angle = Some(angle);
            }
            if drag_row(ui, "decay", &mut decay, 0.05) {
                update.decay = Some(decay);
            }
            if ui.checkbox(&mut cast_shadow, "castShadow").changed() {
                update.cast_shadow = Some(cast_shadow);
            }
        }
    }
    update
}

fn drag_row(ui: &mut Ui, label: &str, value: &mut f32, speed: f32) -> bool {
    param_row(ui, label, |ui| {
        ui.add(egui::DragValue::new(value).speed(speed)).changed()
    })
}

fn vec3_row(ui: &mut Ui, label: &str, value: &mut [f32; 3]) -> bool {
    param_row(ui, label, |ui| {
        let mut changed = false;
        for component in value.iter_mut() {
            if ui.add(egui::DragValue::new(component).speed(0.1)).changed() {
                changed = true;
            }
        }
        changed
    })
}

fn param_row(ui: &mut Ui, label: &str, add_controls: impl FnOnce(&mut Ui) -> bool) -> bool {
    let total_width = ui.available_width();
    let row_height = 28.0;
    let label_width = (total_width * 0.35).clamp(80.0, 140.0);
    let controls_width = (total_width - label_width).max(120.0);
    let mut changed = false;
    ui.allocate_ui_with_layout(
        egui::vec2(total_width, row_height),
        egui::Layout::left_to_right(egui::Align::Min),
        |ui| {
            ui.allocate_ui_with_layout(
                egui::vec2(label_width, row_height),
                egui::Layout::right_to_left(egui::Align::Center),
                |ui| {
                    ui.set_min_height(row_height);
                    ui.label(label);
                },
            );
            ui.allocate_ui_with_layout(
                egui::vec2(controls_width, row_height),
                egui::Layout::left_to_right(egui::Align::Center),
                |ui| {
                    ui.set_min_height(row_height);
                    if add_controls(ui) {
                        changed = true;
                    }
                },
            );
        },
    );
    changed
}

pub(crate) fn parse_hex_color(text: &str) -> Option<[u8; 3]> {
    let hex = text.trim().strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    Some([channel(0..2)?, channel(2..4)?, channel(4..6)?])
}

pub(crate) fn hex_color(rgb: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2])
}
