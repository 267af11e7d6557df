use egui::Color32;

use loom_core::{Slot, Thumbnail};

pub(super) fn slot_color(slot: Slot) -> Color32 {
    match slot {
        Slot::Diffuse => Color32::from_rgb(220, 180, 90),
        Slot::Reflection | Slot::Refraction => Color32::from_rgb(90, 210, 210),
        Slot::Bump | Slot::Normal | Slot::Displacement => Color32::from_rgb(80, 160, 255),
        Slot::Specular | Slot::Metalness | Slot::Roughness => Color32::from_rgb(200, 120, 220),
        Slot::Emissive => Color32::from_rgb(255, 160, 90),
        Slot::Opacity | Slot::AO => Color32::from_rgb(140, 220, 140),
    }
}

pub(super) fn average_color32(thumbnail: &Thumbnail) -> Color32 {
    let [r, g, b] = thumbnail.average_color;
    Color32::from_rgb(r, g, b)
}

pub(super) fn thumbnail_image(thumbnail: &Thumbnail) -> egui::ColorImage {
    egui::ColorImage::from_rgba_unmultiplied(
        [thumbnail.width as usize, thumbnail.height as usize],
        &thumbnail.rgba,
    )
}
