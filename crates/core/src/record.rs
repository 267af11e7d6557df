//! Serialization shapes exchanged with the document store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::light::{Light, LightId, LightKind, LightParams};
use crate::material::ParamValue;
use crate::slot::{slot_from_url_field, Slot};

const FABRIC_NAME: &str = "fabricName";
const FABRIC_COLOR: &str = "fabricColor";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FabricId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("unknown light type {0:?}")]
    UnknownLightType(String),
    #[error("malformed position {0:?}")]
    MalformedPosition(String),
    #[error("invalid field {field}: {message}")]
    InvalidField { field: String, message: String },
}

/// A light as persisted: positions travel as JSON-encoded strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightRecord {
    pub light_type: String,
    pub intensity: f32,
    #[serde(default)]
    pub position: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_position: Option<String>,
    #[serde(default)]
    pub angle: Option<f32>,
    #[serde(default)]
    pub decay: Option<f32>,
    #[serde(default)]
    pub cast_shadow: bool,
}

impl LightRecord {
    pub fn encode(light: &Light) -> Self {
        let position = light.position().unwrap_or([0.0, 0.0, 0.0]);
        let (target_position, angle, decay) = match light.params {
            LightParams::Directional {
                target_position, ..
            } => (Some(encode_vec3(target_position)), None, None),
            LightParams::Spot { angle, decay, .. } => (None, Some(angle), Some(decay)),
            LightParams::Ambient { .. }
            | LightParams::Hemisphere { .. }
            | LightParams::Point { .. } => (None, None, None),
        };
        let cast_shadow = match light.params {
            LightParams::Ambient { .. } | LightParams::Hemisphere { .. } => true,
            _ => light.cast_shadow(),
        };

        Self {
            light_type: light.label.clone(),
            intensity: light.intensity(),
            position: encode_vec3(position),
            target_position,
            angle,
            decay,
            cast_shadow,
        }
    }

    /// Rebuilds a light. Null `angle` loads as 0 and null `decay` as 1.
    pub fn decode(&self) -> Result<Light, RecordError> {
        let kind = LightKind::from_label(&self.light_type)
            .ok_or_else(|| RecordError::UnknownLightType(self.light_type.clone()))?;
        let intensity = self.intensity;
        let params = match kind {
            LightKind::Ambient => LightParams::Ambient { intensity },
            LightKind::Hemisphere => LightParams::Hemisphere { intensity },
            LightKind::Directional => LightParams::Directional {
                intensity,
                position: decode_vec3(&self.position)?,
                target_position: match &self.target_position {
                    Some(raw) => decode_vec3(raw)?,
                    None => [0.0, 0.0, 0.0],
                },
                cast_shadow: self.cast_shadow,
            },
            LightKind::Point => LightParams::Point {
                intensity,
                position: decode_vec3(&self.position)?,
                cast_shadow: self.cast_shadow,
            },
            LightKind::Spot => LightParams::Spot {
                intensity,
                position: decode_vec3(&self.position)?,
                angle: self.angle.unwrap_or(0.0),
                decay: self.decay.unwrap_or(1.0),
                cast_shadow: self.cast_shadow,
            },
        };

        Ok(Light {
            id: LightId::new(),
            label: self.light_type.trim().to_string(),
            params,
        })
    }
}

fn encode_vec3(v: [f32; 3]) -> String {
    serde_json::to_string(&v).unwrap_or_else(|_| "[0,0,0]".to_string())
}

fn decode_vec3(raw: &str) -> Result<[f32; 3], RecordError> {
    if raw.trim().is_empty() {
        return Ok([0.0, 0.0, 0.0]);
    }
    serde_json::from_str(raw).map_err(|_| RecordError::MalformedPosition(raw.to_string()))
}

/// Decodes every record it can; unknown or malformed lights are logged and skipped.
pub fn decode_lights(records: &[LightRecord]) -> Vec<Light> {
    records
        .iter()
        .filter_map(|record| match record.decode() {
            Ok(light) => Some(light),
            Err(err) => {
                tracing::warn!("skipping light record: {}", err);
                None
            }
        })
        .collect()
}

pub fn encode_lights(lights: &[Light]) -> Vec<LightRecord> {
    lights.iter().map(LightRecord::encode).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub name: String,
    pub lights: Vec<LightRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: ProjectId,
    pub name: String,
    pub created_at: u64,
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FabricSummary {
    pub id: FabricId,
    pub fabric_name: String,
    pub fabric_color: String,
    pub created_at: u64,
}

/// Full fabric document: name, color, one URL (or null) per slot, flat parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct FabricPayload {
    pub fabric_name: String,
    pub fabric_color: String,
    pub maps: BTreeMap<Slot, String>,
    pub params: BTreeMap<String, ParamValue>,
}

impl FabricPayload {
    pub fn map_url(&self, slot: Slot) -> Option<&str> {
        self.maps.get(&slot).map(String::as_str)
    }

    /// Applies a partial update in place.
    pub fn apply(&mut self, update: &FabricUpdate) {
        if let Some(name) = &update.fabric_name {
            self.fabric_name = name.clone();
        }
        if let Some(color) = &update.fabric_color {
            self.fabric_color = color.clone();
        }
        for (slot, change) in &update.maps {
            match change {
                Some(url) => {
                    self.maps.insert(*slot, url.clone());
                }
                None => {
                    self.maps.remove(slot);
                }
            }
        }
        for (name, value) in &update.params {
            self.params.insert(name.clone(), value.clone());
        }
    }
}

impl From<FabricPayload> for Map<String, Value> {
    fn from(payload: FabricPayload) -> Self {
        let mut out = Map::new();
        out.insert(FABRIC_NAME.to_string(), Value::String(payload.fabric_name));
        out.insert(FABRIC_COLOR.to_string(), Value::String(payload.fabric_color));
        for slot in Slot::ALL {
            let value = payload
                .maps
                .get(&slot)
                .map(|url| Value::String(url.clone()))
                .unwrap_or(Value::Null);
            out.insert(slot.url_field().to_string(), value);
        }
        insert_params(&mut out, payload.params);
        out
    }
}

impl TryFrom<Map<String, Value>> for FabricPayload {
    type Error = RecordError;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut payload = FabricPayload::default();
        for (key, value) in map {
            match key.as_str() {
                FABRIC_NAME => payload.fabric_name = string_field(&key, value)?.unwrap_or_default(),
                FABRIC_COLOR => {
                    payload.fabric_color = string_field(&key, value)?.unwrap_or_default()
                }
                _ => {
                    if let Some(slot) = slot_from_url_field(&key) {
                        if let Some(url) = string_field(&key, value)? {
                            payload.maps.insert(slot, url);
                        }
                    } else if let Some(param) = param_field(&key, value)? {
                        payload.params.insert(key, param);
                    }
                }
            }
        }
        Ok(payload)
    }
}

/// Partial fabric update.
///
/// Map fields are tri-state on the wire: an omitted field leaves the stored URL
/// unchanged (absent from `maps`), an explicit `null` clears it (`Some(None)`
/// is stored as `None`), and a string replaces it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct FabricUpdate {
    pub fabric_name: Option<String>,
    pub fabric_color: Option<String>,
    pub maps: BTreeMap<Slot, Option<String>>,
    pub params: BTreeMap<String, ParamValue>,
}

impl From<FabricUpdate> for Map<String, Value> {
    fn from(update: FabricUpdate) -> Self {
        let mut out = Map::new();
        if let Some(name) = update.fabric_name {
            out.insert(FABRIC_NAME.to_string(), Value::String(name));
        }
        if let Some(color) = update.fabric_color {
            out.insert(FABRIC_COLOR.to_string(), Value::String(color));
        }
        for (slot, change) in update.maps {
            let value = change.map(Value::String).unwrap_or(Value::Null);
            out.insert(slot.url_field().to_string(), value);
        }
        insert_params(&mut out, update.params);
        out
    }
}

impl TryFrom<Map<String, Value>> for FabricUpdate {
    type Error = RecordError;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut update = FabricUpdate::default();
        for (key, value) in map {
            match key.as_str() {
                FABRIC_NAME => update.fabric_name = string_field(&key, value)?,
                FABRIC_COLOR => update.fabric_color = string_field(&key, value)?,
                _ => {
                    if let Some(slot) = slot_from_url_field(&key) {
                        let change = string_field(&key, value)?;
                        update.maps.insert(slot, change);
                    } else if let Some(param) = param_field(&key, value)? {
                        update.params.insert(key, param);
                    }
                }
            }
        }
        Ok(update)
    }
}

fn insert_params(out: &mut Map<String, Value>, params: BTreeMap<String, ParamValue>) {
    for (name, value) in params {
        match serde_json::to_value(&value) {
            Ok(json) => {
                out.insert(name, json);
            }
            Err(err) => tracing::warn!("dropping parameter {}: {}", name, err),
        }
    }
}

fn string_field(field: &str, value: Value) -> Result<Option<String>, RecordError> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(text)),
        other => Err(RecordError::InvalidField {
            field: field.to_string(),
            message: format!("expected string or null, got {other}"),
        }),
    }
}

fn param_field(field: &str, value: Value) -> Result<Option<ParamValue>, RecordError> {
    if value.is_null() {
        return Ok(None);
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|err| RecordError::InvalidField {
            field: field.to_string(),
            message: err.to_string(),
        })
}
