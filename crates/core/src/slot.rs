use serde::{Deserialize, Serialize};

/// Label of the single material sink node.
pub const SINK_LABEL: &str = "Mesh Physical Material";

/// Texture-input roles on the material sink, in handle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Slot {
    Diffuse,
    Reflection,
    Refraction,
    Bump,
    Normal,
    Displacement,
    Specular,
    Emissive,
    Opacity,
    AO,
    Metalness,
    Roughness,
}

impl Slot {
    pub const ALL: [Slot; 12] = [
        Slot::Diffuse,
        Slot::Reflection,
        Slot::Refraction,
        Slot::Bump,
        Slot::Normal,
        Slot::Displacement,
        Slot::Specular,
        Slot::Emissive,
        Slot::Opacity,
        Slot::AO,
        Slot::Metalness,
        Slot::Roughness,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Slot::Diffuse => "Diffuse",
            Slot::Reflection => "Reflection",
            Slot::Refraction => "Refraction",
            Slot::Bump => "Bump",
            Slot::Normal => "Normal",
            Slot::Displacement => "Displacement",
            Slot::Specular => "Specular",
            Slot::Emissive => "Emissive",
            Slot::Opacity => "Opacity",
            Slot::AO => "AO",
            Slot::Metalness => "Metalness",
            Slot::Roughness => "Roughness",
        }
    }

    /// Field name used for this slot's URL in stored fabric records.
    pub fn url_field(self) -> &'static str {
        match self {
            Slot::Diffuse => "diffuseMapUrl",
            Slot::Reflection => "reflectionMapUrl",
            Slot::Refraction => "refractionMapUrl",
            Slot::Bump => "bumpMapUrl",
            Slot::Normal => "normalMapUrl",
            Slot::Displacement => "displacementMapUrl",
            Slot::Specular => "specularMapUrl",
            Slot::Emissive => "emissiveMapUrl",
            Slot::Opacity => "opacityMapUrl",
            Slot::AO => "aoMapUrl",
            Slot::Metalness => "metalnessMapUrl",
            Slot::Roughness => "roughnessMapUrl",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Slot> {
        Self::ALL.get(index).copied()
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

pub fn slot_from_name(name: &str) -> Option<Slot> {
    Slot::ALL.into_iter().find(|slot| slot.name() == name)
}

pub fn slot_from_url_field(field: &str) -> Option<Slot> {
    Slot::ALL.into_iter().find(|slot| slot.url_field() == field)
}
