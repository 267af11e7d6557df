use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::asset::Asset;
use crate::slot::Slot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Float(f32),
    Vec2([f32; 2]),
    /// CSS-style hex color, e.g. `#ffffff`.
    Color(String),
}

impl ParamValue {
    pub fn as_float(&self) -> Option<f32> {
        match self {
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec2(&self) -> Option<[f32; 2]> {
        match self {
            ParamValue::Vec2(v) => Some(*v),
            _ => None,
        }
    }
}

/// Editing hints for one material parameter. Ranges are for UI controls only.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub default: ParamValue,
    pub range: (f32, f32),
    pub step: f32,
}

pub fn parameter_specs() -> Vec<ParamSpec> {
    let float = |name, default, min, max| ParamSpec {
        name,
        default: ParamValue::Float(default),
        range: (min, max),
        step: 0.01,
    };
    let flag = |name| ParamSpec {
        name,
        default: ParamValue::Bool(false),
        range: (0.0, 1.0),
        step: 1.0,
    };

    vec![
        float("bumpScale", 0.3, 0.0, 1.0),
        flag("sheenEnabled"),
        float("sheenIntensity", 1.0, 0.0, 1.0),
        float("sheenRoughness", 0.5, 0.0, 1.0),
        ParamSpec {
            name: "sheenColor",
            default: ParamValue::Color("#ffffff".to_string()),
            range: (0.0, 1.0),
            step: 1.0,
        },
        float("displacementScale", 0.1, 0.0, 1.0),
        float("emissiveIntensity", 1.0, 0.0, 5.0),
        float("metalness", 0.5, 0.0, 1.0),
        float("roughness", 0.5, 0.0, 1.0),
        float("displacementBias", 0.0, -1.0, 1.0),
        flag("flatShading"),
        float("aoMapIntensity", 0.0, 0.0, 1.0),
        float("clearcoat", 0.0, 0.0, 1.0),
        ParamSpec {
            name: "normalScale",
            default: ParamValue::Vec2([1.0, 1.0]),
            range: (0.0, 3.0),
            step: 0.01,
        },
        ParamSpec {
            name: "diffuseTiling",
            default: ParamValue::Vec2([1.0, 1.0]),
            range: (0.1, 10.0),
            step: 0.1,
        },
    ]
}

pub fn default_parameters() -> BTreeMap<String, ParamValue> {
    parameter_specs()
        .into_iter()
        .map(|spec| (spec.name.to_string(), spec.default))
        .collect()
}

/// Current slot bindings and parameter values for the edited material.
///
/// Bindings are a cached view of the graph's edge set and are rewritten by
/// [`crate::MaterialGraph`] after every edit. The revision counter moves on every
/// effective change so renderers can tell when to re-read.
#[derive(Debug, Clone)]
pub struct MaterialState {
    bindings: BTreeMap<Slot, Asset>,
    params: BTreeMap<String, ParamValue>,
    revision: u64,
}

impl Default for MaterialState {
    fn default() -> Self {
        Self {
            bindings: BTreeMap::new(),
            params: default_parameters(),
            revision: 0,
        }
    }
}

impl MaterialState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_binding(&mut self, slot: Slot, asset: Option<Asset>) {
        let changed = match asset {
            Some(asset) => {
                if self.bindings.get(&slot) == Some(&asset) {
                    false
                } else {
                    self.bindings.insert(slot, asset);
                    true
                }
            }
            None => self.bindings.remove(&slot).is_some(),
        };
        if changed {
            self.revision += 1;
            tracing::debug!("binding {} updated", slot);
        }
    }

    pub fn set_parameter(&mut self, name: impl Into<String>, value: ParamValue) {
        let name = name.into();
        if self.params.get(&name) == Some(&value) {
            return;
        }
        self.params.insert(name, value);
        self.revision += 1;
    }

    /// Replaces every binding with `projection`, slot by slot.
    pub fn sync_bindings(&mut self, projection: &BTreeMap<Slot, Asset>) {
        for slot in Slot::ALL {
            self.set_binding(slot, projection.get(&slot).cloned());
        }
    }

    /// Copies stored values for the parameters this state already knows about.
    pub fn apply_stored_parameters(&mut self, stored: &BTreeMap<String, ParamValue>) {
        let known: Vec<String> = self.params.keys().cloned().collect();
        for name in known {
            if let Some(value) = stored.get(&name) {
                self.set_parameter(name, value.clone());
            }
        }
    }

    pub fn reset_parameters(&mut self) {
        for (name, value) in default_parameters() {
            self.set_parameter(name, value);
        }
    }

    pub fn binding(&self, slot: Slot) -> Option<&Asset> {
        self.bindings.get(&slot)
    }

    pub fn bindings(&self) -> &BTreeMap<Slot, Asset> {
        &self.bindings
    }

    pub fn parameter(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    pub fn parameters(&self) -> &BTreeMap<String, ParamValue> {
        &self.params
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}
