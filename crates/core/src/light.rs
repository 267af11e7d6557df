use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Maximum number of simultaneous lights of one kind.
pub const MAX_LIGHTS_PER_KIND: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LightId(pub Uuid);

impl LightId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LightId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightKind {
    Ambient,
    Hemisphere,
    Directional,
    Point,
    Spot,
}

impl LightKind {
    pub const ALL: [LightKind; 5] = [
        LightKind::Ambient,
        LightKind::Hemisphere,
        LightKind::Directional,
        LightKind::Point,
        LightKind::Spot,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LightKind::Ambient => "Ambient Light",
            LightKind::Hemisphere => "Hemisphere Light",
            LightKind::Directional => "Directional Light",
            LightKind::Point => "Point Light",
            LightKind::Spot => "Spot Light",
        }
    }

    /// Parses a preset label such as `"Spot Light 3"`.
    pub fn from_label(label: &str) -> Option<LightKind> {
        Self::ALL
            .into_iter()
            .find(|kind| label.trim_start().starts_with(kind.name()))
    }
}

/// Kind-specific light properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LightParams {
    Ambient {
        intensity: f32,
    },
    Hemisphere {
        intensity: f32,
    },
    Directional {
        intensity: f32,
        position: [f32; 3],
        target_position: [f32; 3],
        cast_shadow: bool,
    },
    Point {
        intensity: f32,
        position: [f32; 3],
        cast_shadow: bool,
    },
    Spot {
        intensity: f32,
        position: [f32; 3],
        angle: f32,
        decay: f32,
        cast_shadow: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub id: LightId,
    pub label: String,
    pub params: LightParams,
}

impl Light {
    /// Preset `index` (0-based) for `kind`, labelled `"<Kind> Light <index + 1>"`.
    pub fn preset(kind: LightKind, index: usize) -> Self {
        let params = match kind {
            LightKind::Ambient => LightParams::Ambient { intensity: 1.0 },
            LightKind::Hemisphere => LightParams::Hemisphere { intensity: 1.0 },
            LightKind::Directional => LightParams::Directional {
                intensity: 1.0,
                position: [0.0, 5.0, 5.0],
                target_position: [0.0, 0.0, 0.0],
                cast_shadow: true,
            },
            LightKind::Point => LightParams::Point {
                intensity: 1.0,
                position: [5.0, 5.0, 5.0],
                cast_shadow: true,
            },
            LightKind::Spot => LightParams::Spot {
                intensity: 1.0,
                position: [5.0, 5.0, 5.0],
                angle: std::f32::consts::FRAC_PI_6,
                decay: 2.0,
                cast_shadow: true,
            },
        };
        Self {
            id: LightId::new(),
            label: format!("{} {}", kind.name(), index + 1),
            params,
        }
    }

    pub fn kind(&self) -> LightKind {
        match self.params {
            LightParams::Ambient { .. } => LightKind::Ambient,
            LightParams::Hemisphere { .. } => LightKind::Hemisphere,
            LightParams::Directional { .. } => LightKind::Directional,
            LightParams::Point { .. } => LightKind::Point,
            LightParams::Spot { .. } => LightKind::Spot,
        }
    }

    pub fn intensity(&self) -> f32 {
        match self.params {
            LightParams::Ambient { intensity }
            | LightParams::Hemisphere { intensity }
            | LightParams::Directional { intensity, .. }
            | LightParams::Point { intensity, .. }
            | LightParams::Spot { intensity, .. } => intensity,
        }
    }

    pub fn position(&self) -> Option<[f32; 3]> {
        match self.params {
            LightParams::Ambient { .. } | LightParams::Hemisphere { .. } => None,
            LightParams::Directional { position, .. }
            | LightParams::Point { position, .. }
            | LightParams::Spot { position, .. } => Some(position),
        }
    }

    pub fn cast_shadow(&self) -> bool {
        match self.params {
            LightParams::Ambient { .. } | LightParams::Hemisphere { .. } => false,
            LightParams::Directional { cast_shadow, .. }
            | LightParams::Point { cast_shadow, .. }
            | LightParams::Spot { cast_shadow, .. } => cast_shadow,
        }
    }

    /// Unit vector the light shines along, for lights that have one.
    /// Spot lights aim at the origin.
    pub fn direction(&self) -> Option<Vec3> {
        let (from, to) = match self.params {
            LightParams::Directional {
                position,
                target_position,
                ..
            } => (Vec3::from(position), Vec3::from(target_position)),
            LightParams::Spot { position, .. } => (Vec3::from(position), Vec3::ZERO),
            LightParams::Ambient { .. }
            | LightParams::Hemisphere { .. }
            | LightParams::Point { .. } => return None,
        };
        let dir = (to - from).normalize_or_zero();
        (dir != Vec3::ZERO).then_some(dir)
    }

    /// Applies the fields of `update` that are meaningful for this light's kind.
    pub fn apply(&mut self, update: &LightUpdate) {
        match &mut self.params {
            LightParams::Ambient { intensity } | LightParams::Hemisphere { intensity } => {
                set(intensity, update.intensity);
            }
            LightParams::Directional {
                intensity,
                position,
                target_position,
                cast_shadow,
            } => {
                set(intensity, update.intensity);
                set(position, update.position);
                set(target_position, update.target_position);
                set(cast_shadow, update.cast_shadow);
            }
            LightParams::Point {
                intensity,
                position,
                cast_shadow,
            } => {
                set(intensity, update.intensity);
                set(position, update.position);
                set(cast_shadow, update.cast_shadow);
            }
            LightParams::Spot {
                intensity,
                position,
                angle,
                decay,
                cast_shadow,
            } => {
                set(intensity, update.intensity);
                set(position, update.position);
                set(angle, update.angle);
                set(decay, update.decay);
                set(cast_shadow, update.cast_shadow);
            }
        }
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

/// Partial edit of a light; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightUpdate {
    pub intensity: Option<f32>,
    pub position: Option<[f32; 3]>,
    pub target_position: Option<[f32; 3]>,
    pub angle: Option<f32>,
    pub decay: Option<f32>,
    pub cast_shadow: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LightError {
    #[error("Maximum number of lights for this type reached ({kind:?})")]
    MaximumReached { kind: LightKind },
}

#[derive(Debug, Clone)]
pub struct LightState {
    lights: Vec<Light>,
    selected_kind: LightKind,
    revision: u64,
}

impl Default for LightState {
    fn default() -> Self {
        Self {
            lights: Vec::new(),
            selected_kind: LightKind::Ambient,
            revision: 0,
        }
    }
}

impl LightState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected_kind(&self) -> LightKind {
        self.selected_kind
    }

    pub fn select_kind(&mut self, kind: LightKind) {
        self.selected_kind = kind;
    }

    /// Adds the next preset of the selected kind.
    pub fn add_light(&mut self) -> Result<LightId, LightError> {
        self.add_light_of(self.selected_kind)
    }

    pub fn add_light_of(&mut self, kind: LightKind) -> Result<LightId, LightError> {
        let count = self.count(kind);
        if count >= MAX_LIGHTS_PER_KIND {
            tracing::warn!("Maximum number of lights for this type reached");
            return Err(LightError::MaximumReached { kind });
        }
        let light = Light::preset(kind, count);
        let id = light.id;
        tracing::debug!("added {}", light.label);
        self.lights.push(light);
        self.revision += 1;
        Ok(id)
    }

    pub fn delete_light(&mut self, id: LightId) -> bool {
        let before = self.lights.len();
        self.lights.retain(|light| light.id != id);
        let removed = self.lights.len() != before;
        if removed {
            self.revision += 1;
        }
        removed
    }

    pub fn update_light(&mut self, id: LightId, update: &LightUpdate) -> bool {
        let Some(light) = self.lights.iter_mut().find(|light| light.id == id) else {
            return false;
        };
        light.apply(update);
        self.revision += 1;
        true
    }

    /// Replaces the whole collection; nothing of the previous state survives.
    pub fn reset_lights(&mut self, lights: Vec<Light>) {
        self.lights = lights;
        self.revision += 1;
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn light(&self, id: LightId) -> Option<&Light> {
        self.lights.iter().find(|light| light.id == id)
    }

    pub fn count(&self, kind: LightKind) -> usize {
        self.lights.iter().filter(|light| light.kind() == kind).count()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}
