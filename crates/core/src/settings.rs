use serde::{Deserialize, Serialize};

pub const SETTINGS_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EditorSettings {
    pub version: u32,
    pub side_panel_width: f32,
    pub panels: PanelSettings,
    pub log_level: LogLevelSetting,
    /// How long transient notices stay on screen, in seconds.
    pub notice_seconds: f32,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            side_panel_width: 320.0,
            panels: PanelSettings::default(),
            log_level: LogLevelSetting::Info,
            notice_seconds: 4.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PanelSettings {
    pub show_parameters: bool,
    pub show_lights: bool,
    pub show_notices: bool,
    pub show_debug: bool,
    pub show_console: bool,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            show_parameters: true,
            show_lights: true,
            show_notices: true,
            show_debug: false,
            show_console: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogLevelSetting {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}
