mod asset;
mod graph;
mod light;
mod material;
mod record;
mod session;
mod settings;
mod slot;
mod thumbnail;

pub use asset::{content_type_for, Asset, FileAsset};
pub use graph::{project, ConnectionError, Edge, MaterialGraph, NodeId, SourceNode};
pub use light::{
    Light, LightError, LightId, LightKind, LightParams, LightState, LightUpdate,
    MAX_LIGHTS_PER_KIND,
};
pub use material::{default_parameters, parameter_specs, MaterialState, ParamSpec, ParamValue};
pub use record::{
    decode_lights, encode_lights, FabricId, FabricPayload, FabricSummary, FabricUpdate,
    LightRecord, ProjectId, ProjectRecord, ProjectSummary, RecordError,
};
pub use session::{
    EditorSession, RequestKind, RequestTicket, SaveTicket, SessionError, SessionSnapshot,
    DEFAULT_FABRIC_COLOR,
};
pub use settings::{EditorSettings, LogLevelSetting, PanelSettings, SETTINGS_VERSION};
pub use slot::{slot_from_name, slot_from_url_field, Slot, SINK_LABEL};
pub use thumbnail::{
    average_color, css_rgb, make_thumbnail, thumbnail_for_asset, Thumbnail, ThumbnailError,
    THUMBNAIL_SIZE,
};
