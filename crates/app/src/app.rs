use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use eframe::egui;
use loom_core::{
    EditorSession, EditorSettings, FabricId, FabricSummary, LogLevelSetting, ProjectId,
    ProjectSummary, RequestKind,
};
use loom_store::StoreConfig;
use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::node_graph::NodeGraphState;
use crate::worker::{Job, Reply, Worker, SAVE_FABRIC};

mod notices;
mod panels;

use notices::Notices;

const MAX_LOG_LINES: usize = 500;
pub(crate) const CONFIG_PATH: &str = "loom.json";

#[derive(Clone)]
pub(crate) struct ConsoleBuffer {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl ConsoleBuffer {
    fn new() -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    fn push_line(&self, line: String) {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        lines.push_back(line);
        while lines.len() > MAX_LOG_LINES {
            lines.pop_front();
        }
    }

    fn snapshot(&self) -> Vec<String> {
        let lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        lines.iter().cloned().collect()
    }
}

struct ConsoleMakeWriter {
    buffer: ConsoleBuffer,
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for ConsoleMakeWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter {
            buffer: self.buffer.clone(),
        }
    }
}

struct ConsoleWriter {
    buffer: ConsoleBuffer,
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        for line in text.lines() {
            self.buffer.push_line(line.to_string());
        }

        let _ = io::stdout().write_all(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = io::stdout().flush();
        Ok(())
    }
}

/// Contents of the optional `loom.json` next to the binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub(crate) store: StoreConfig,
    pub(crate) editor: EditorSettings,
}

impl AppConfig {
    /// A missing file yields the defaults.
    pub(crate) fn load(path: &Path) -> Result<Self, String> {
        match std::fs::read(path) {
            Ok(data) => serde_json::from_slice(&data)
                .map_err(|err| format!("invalid {}: {}", path.display(), err)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(format!("failed to read {}: {}", path.display(), err)),
        }
    }

    pub(crate) fn save(&self, path: &Path) -> Result<(), String> {
        let data = serde_json::to_vec_pretty(self).map_err(|err| err.to_string())?;
        std::fs::write(path, data).map_err(|err| err.to_string())
    }
}

/// Something the user asked for this frame; applied after the panels are drawn.
#[derive(Debug, Clone, PartialEq)]
enum Action {
    NewFabric,
    SaveFabric,
    LoadFabric(FabricId),
    SaveLights(String),
    LoadProject(ProjectId),
    LoadDefaultProject,
    SetDefaultProject(ProjectId),
    Refresh,
    SaveSettings,
}

pub(crate) struct EditorApp {
    session: EditorSession,
    settings: EditorSettings,
    store_config: StoreConfig,
    console: ConsoleBuffer,
    log_level: LevelFilter,
    log_level_state: Arc<AtomicU8>,
    node_graph: NodeGraphState,
    worker: Option<Worker>,
    save_pending: bool,
    notices: Notices,
    fabric_id_input: String,
    project_id_input: String,
    project_name_input: String,
    fabric_list: Vec<FabricSummary>,
    project_list: Vec<ProjectSummary>,
}

impl EditorApp {
    pub(crate) fn new(
        config: AppConfig,
        console: ConsoleBuffer,
        log_level_state: Arc<AtomicU8>,
        repaint: Option<egui::Context>,
    ) -> Self {
        let mut notices = Notices::default();
        let worker = match Worker::spawn(&config.store, repaint) {
            Ok(worker) => Some(worker),
            Err(err) => {
                tracing::error!("failed to start store worker: {}", err);
                notices.error(format!("Storage unavailable: {err}"));
                None
            }
        };

        let mut app = Self {
            session: EditorSession::new(),
            log_level: level_filter_from_setting(config.editor.log_level),
            settings: config.editor,
            store_config: config.store,
            console,
            log_level_state,
            node_graph: NodeGraphState::default(),
            worker,
            save_pending: false,
            notices,
            fabric_id_input: String::new(),
            project_id_input: String::new(),
            project_name_input: String::new(),
            fabric_list: Vec::new(),
            project_list: Vec::new(),
        };
        app.perform(Action::Refresh);
        app.perform(Action::LoadDefaultProject);
        app
    }

    fn submit(&mut self, job: Job) {
        match &self.worker {
            Some(worker) => worker.submit(job),
            None => self.notices.error("Storage unavailable"),
        }
    }

    fn perform(&mut self, action: Action) {
        tracing::debug!("action {:?}", action);
        match action {
            Action::NewFabric => {
                self.session.clear_fabric();
                self.node_graph.reset();
                tracing::info!("new fabric");
            }
            Action::SaveFabric => {
                if self.session.fabric_name().trim().is_empty() {
                    tracing::warn!("save rejected: fabric has no name");
                    self.notices.error("Enter a fabric name before saving.");
                    return;
                }
                if self.save_pending {
                    tracing::debug!("save rejected: previous save still running");
                    self.notices.error("A save is already in progress.");
                    return;
                }
                let Some(worker) = &self.worker else {
                    self.notices.error("Storage unavailable");
                    return;
                };
                worker.submit(Job::SaveFabric {
                    ticket: self.session.begin_save(),
                    snapshot: self.session.snapshot(),
                });
                self.save_pending = true;
            }
            Action::LoadFabric(id) => {
                let ticket = self.session.begin_request(RequestKind::Fabric);
                self.submit(Job::LoadFabric { ticket, id });
            }
            Action::SaveLights(name) => {
                let name = name.trim().to_string();
                if name.is_empty() {
                    tracing::warn!("save rejected: project has no name");
                    self.notices.error("Enter a project name before saving lights.");
                    return;
                }
                let lights = self.session.lights().lights().to_vec();
                self.submit(Job::SaveLights { name, lights });
            }
            Action::LoadProject(id) => {
                let ticket = self.session.begin_request(RequestKind::Project);
                self.submit(Job::LoadProject { ticket, id });
            }
            Action::LoadDefaultProject => {
                let ticket = self.session.begin_request(RequestKind::Project);
                self.submit(Job::LoadDefaultProject { ticket });
            }
            Action::SetDefaultProject(id) => self.submit(Job::SetDefaultProject { id }),
            Action::Refresh => self.submit(Job::Refresh),
            Action::SaveSettings => {
                let config = AppConfig {
                    store: self.store_config.clone(),
                    editor: self.settings.clone(),
                };
                match config.save(Path::new(CONFIG_PATH)) {
                    Ok(()) => self.notices.info("Settings saved"),
                    Err(err) => {
                        tracing::error!("failed to save settings: {}", err);
                        self.notices.error(format!("Failed to save settings: {err}"));
                    }
                }
            }
        }
    }

    fn handle_reply(&mut self, reply: Reply) {
        match reply {
            Reply::FabricSaved { ticket, saved } => {
                self.save_pending = false;
                match self.session.finish_save(&ticket, saved.id, &saved.uploaded) {
                    Ok(()) => self.notices.info(format!("Fabric {} saved", saved.id.0)),
                    Err(err) => {
                        tracing::debug!("{}", err);
                        self.notices.info(format!("Saved as fabric {}", saved.id.0));
                    }
                }
                self.perform(Action::Refresh);
            }
            Reply::FabricLoaded { ticket, id, payload } => {
                match self.session.load_fabric(&ticket, id, &payload) {
                    Ok(()) => {
                        self.node_graph.reset();
                        self.notices.info(format!("Loaded fabric {}", payload.fabric_name));
                    }
                    Err(err) => {
                        tracing::debug!("ignored fabric {}: {}", id.0, err);
                    }
                }
            }
            Reply::LightsSaved(id) => {
                self.notices.info(format!("Lights saved as project {}", id.0));
                self.perform(Action::Refresh);
            }
            Reply::ProjectLoaded { ticket, project } => {
                match self.session.apply_project(&ticket, &project.project) {
                    Ok(count) => self.notices.info(format!(
                        "Loaded {} lights from {}",
                        count, project.project.name
                    )),
                    Err(err) => {
                        tracing::debug!("ignored project {}: {}", project.id.0, err);
                    }
                }
            }
            Reply::DefaultSet(id) => {
                self.notices.info(format!("Project {} is now the default", id.0));
                self.perform(Action::Refresh);
            }
            Reply::Listing { fabrics, projects } => {
                self.fabric_list = fabrics;
                self.project_list = projects;
            }
            Reply::Failed { action, message } => {
                if action == SAVE_FABRIC {
                    self.save_pending = false;
                }
                self.notices.error(format!("Failed to {action}: {message}"));
            }
        }
    }

    fn poll_worker(&mut self) {
        let replies = match &self.worker {
            Some(worker) => worker.poll(),
            None => return,
        };
        for reply in replies {
            self.handle_reply(reply);
        }
    }

    fn set_log_level(&mut self, new_level: LevelFilter) {
        if new_level == self.log_level {
            return;
        }

        self.log_level_state
            .store(level_filter_to_u8(new_level), Ordering::Relaxed);
        self.log_level = new_level;
        self.settings.log_level = setting_from_level_filter(new_level);
    }

    fn top_bar(&mut self, ctx: &egui::Context, actions: &mut Vec<Action>) {
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            egui::MenuBar::new().ui(ui, |ui| {
                ui.menu_button("Fabric", |ui| {
                    if ui.button("New fabric").clicked() {
                        actions.push(Action::NewFabric);
                        ui.close();
                    }
                    if ui
                        .add_enabled(!self.save_pending, egui::Button::new("Save fabric"))
                        .clicked()
                    {
                        actions.push(Action::SaveFabric);
                        ui.close();
                    }
                    ui.separator();
                    ui.horizontal(|ui| {
                        ui.label("Id");
                        ui.add(
                            egui::TextEdit::singleline(&mut self.fabric_id_input)
                                .desired_width(80.0),
                        );
                        if ui.button("Load fabric").clicked() {
                            match parse_id(&self.fabric_id_input) {
                                Some(id) => actions.push(Action::LoadFabric(FabricId(id))),
                                None => self.notices.error("Fabric id must be a number"),
                            }
                            ui.close();
                        }
                    });
                });

                ui.menu_button("Project", |ui| {
                    ui.horizontal(|ui| {
                        ui.label("Name");
                        ui.add(
                            egui::TextEdit::singleline(&mut self.project_name_input)
                                .desired_width(140.0),
                        );
                    });
                    if ui.button("Save lights as project").clicked() {
                        actions.push(Action::SaveLights(self.project_name_input.clone()));
                        ui.close();
                    }
                    ui.separator();
                    ui.horizontal(|ui| {
                        ui.label("Id");
                        ui.add(
                            egui::TextEdit::singleline(&mut self.project_id_input)
                                .desired_width(80.0),
                        );
                    });
                    ui.horizontal(|ui| {
                        let parsed = parse_id(&self.project_id_input).map(ProjectId);
                        if ui.button("Load project").clicked() {
                            match parsed {
                                Some(id) => actions.push(Action::LoadProject(id)),
                                None => self.notices.error("Project id must be a number"),
                            }
                            ui.close();
                        }
                        if ui.button("Set default").clicked() {
                            match parsed {
                                Some(id) => actions.push(Action::SetDefaultProject(id)),
                                None => self.notices.error("Project id must be a number"),
                            }
                            ui.close();
                        }
                    });
                    if ui.button("Load default project").clicked() {
                        actions.push(Action::LoadDefaultProject);
                        ui.close();
                    }
                });

                ui.separator();
                ui.label("loom");
                ui.separator();
                let panels = &mut self.settings.panels;
                ui.checkbox(&mut panels.show_parameters, "Parameters");
                ui.checkbox(&mut panels.show_lights, "Lights");
                ui.checkbox(&mut panels.show_notices, "Notices");
                ui.checkbox(&mut panels.show_debug, "Debug");
                ui.checkbox(&mut panels.show_console, "Console");
            });
        });
    }

    fn side_panel(&mut self, ctx: &egui::Context, actions: &mut Vec<Action>) {
        egui::SidePanel::right("side_panels")
            .resizable(true)
            .default_width(self.settings.side_panel_width)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    if self.settings.panels.show_parameters {
                        egui::CollapsingHeader::new("Parameters")
                            .default_open(true)
                            .show(ui, |ui| {
                                panels::show_parameters(ui, &mut self.session)
                            });
                    }

                    if self.settings.panels.show_lights {
                        egui::CollapsingHeader::new("Lights")
                            .default_open(true)
                            .show(ui, |ui| {
                                panels::show_lights(
                                    ui,
                                    self.session.lights_mut(),
                                    &mut self.notices,
                                );
                            });
                    }

                    egui::CollapsingHeader::new("Library")
                        .default_open(false)
                        .show(ui, |ui| self.library(ui, actions));

                    if self.settings.panels.show_notices {
                        egui::CollapsingHeader::new("Notices")
                            .default_open(true)
                            .show(ui, |ui| self.notices.show(ui));
                    }

                    if self.settings.panels.show_debug {
                        egui::CollapsingHeader::new("Debug")
                            .default_open(true)
                            .show(ui, |ui| self.debug(ui, actions));
                    }

                    if self.settings.panels.show_console {
                        egui::CollapsingHeader::new("Console")
                            .default_open(true)
                            .show(ui, |ui| {
                                egui::ScrollArea::vertical()
                                    .id_salt("console")
                                    .max_height(240.0)
                                    .stick_to_bottom(true)
                                    .show(ui, |ui| {
                                        for line in self.console.snapshot() {
                                            ui.label(line);
                                        }
                                    });
                            });
                    }
                });
            });
    }

    fn library(&mut self, ui: &mut egui::Ui, actions: &mut Vec<Action>) {
        if ui.button("Refresh").clicked() {
            actions.push(Action::Refresh);
        }
        ui.label("Fabrics");
        if self.fabric_list.is_empty() {
            ui.weak("none stored");
        }
        for fabric in &self.fabric_list {
            ui.horizontal(|ui| {
                ui.label(format!("{} {}", fabric.id.0, fabric.fabric_name));
                if ui.small_button("Load").clicked() {
                    actions.push(Action::LoadFabric(fabric.id));
                }
            });
        }
        ui.separator();
        ui.label("Projects");
        if self.project_list.is_empty() {
            ui.weak("none stored");
        }
        for project in &self.project_list {
            ui.horizontal(|ui| {
                let marker = if project.is_default { " (default)" } else { "" };
                ui.label(format!("{} {}{}", project.id.0, project.name, marker));
                if ui.small_button("Load").clicked() {
                    actions.push(Action::LoadProject(project.id));
                }
                if !project.is_default && ui.small_button("Set default").clicked() {
                    actions.push(Action::SetDefaultProject(project.id));
                }
            });
        }
    }

    fn debug(&mut self, ui: &mut egui::Ui, actions: &mut Vec<Action>) {
        let graph = self.session.graph();
        ui.label(format!(
            "Fabric: {}",
            match self.session.fabric_id() {
                Some(id) => id.0.to_string(),
                None => "unsaved".to_string(),
            }
        ));
        ui.label(format!(
            "Nodes: {}  Edges: {}  Wires: {}",
            graph.node_count(),
            graph.edges().count(),
            self.node_graph.wire_count()
        ));
        ui.label(format!(
            "Revisions: graph {}  material {}  lights {}",
            graph.revision(),
            self.session.material().revision(),
            self.session.lights().revision()
        ));
        ui.label(format!(
            "Bound slots: {}",
            self.session.material().bindings().len()
        ));
        if let Some(node) = self.node_graph.selected_node_id() {
            ui.label(format!("Selected: node {}", node.raw()));
        }

        ui.separator();
        ui.add(
            egui::Slider::new(&mut self.settings.notice_seconds, 1.0..=30.0)
                .text("Notice seconds"),
        );

        let mut selected = self.log_level;
        egui::ComboBox::from_label("Log level")
            .selected_text(format!("{:?}", selected))
            .show_ui(ui, |ui| {
                for level in [
                    LevelFilter::ERROR,
                    LevelFilter::WARN,
                    LevelFilter::INFO,
                    LevelFilter::DEBUG,
                    LevelFilter::TRACE,
                ] {
                    ui.selectable_value(&mut selected, level, format!("{:?}", level));
                }
            });
        self.set_log_level(selected);

        if ui.button("Save settings").clicked() {
            actions.push(Action::SaveSettings);
        }
    }
}

impl eframe::App for EditorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_worker();

        let mut actions = Vec::new();
        self.top_bar(ctx, &mut actions);
        self.side_panel(ctx, &mut actions);

        egui::CentralPanel::default().show(ctx, |ui| {
            let events = self.node_graph.show(ui, &mut self.session);
            for error in events.errors {
                self.notices.error(error);
            }
        });

        for action in actions {
            self.perform(action);
        }

        let lifetime = Duration::from_secs_f32(self.settings.notice_seconds.max(0.5));
        self.notices.prune(Instant::now(), lifetime);
        if !self.notices.is_empty() {
            ctx.request_repaint_after(Duration::from_millis(250));
        }
    }
}

fn parse_id(text: &str) -> Option<u64> {
    text.trim().parse().ok()
}

pub(crate) fn setup_tracing(initial: LogLevelSetting) -> (ConsoleBuffer, Arc<AtomicU8>) {
    let console = ConsoleBuffer::new();
    let log_level_state = Arc::new(AtomicU8::new(level_filter_to_u8(
        level_filter_from_setting(initial),
    )));
    let filter_state = log_level_state.clone();
    let filter_layer = tracing_subscriber::filter::filter_fn(move |metadata| {
        let level = match filter_state.load(Ordering::Relaxed) {
            value if value == level_filter_to_u8(LevelFilter::ERROR) => Level::ERROR,
            value if value == level_filter_to_u8(LevelFilter::WARN) => Level::WARN,
            value if value == level_filter_to_u8(LevelFilter::INFO) => Level::INFO,
            value if value == level_filter_to_u8(LevelFilter::DEBUG) => Level::DEBUG,
            _ => Level::TRACE,
        };
        metadata.level() <= &level
    });
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(ConsoleMakeWriter {
            buffer: console.clone(),
        });

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter_layer))
        .init();

    (console, log_level_state)
}

fn level_filter_to_u8(level: LevelFilter) -> u8 {
    match level {
        LevelFilter::OFF => 0,
        LevelFilter::ERROR => 1,
        LevelFilter::WARN => 2,
        LevelFilter::INFO => 3,
        LevelFilter::DEBUG => 4,
        LevelFilter::TRACE => 5,
    }
}

fn level_filter_from_setting(setting: LogLevelSetting) -> LevelFilter {
    match setting {
        LogLevelSetting::Error => LevelFilter::ERROR,
        LogLevelSetting::Warn => LevelFilter::WARN,
        LogLevelSetting::Info => LevelFilter::INFO,
        LogLevelSetting::Debug => LevelFilter::DEBUG,
        LogLevelSetting::Trace => LevelFilter::TRACE,
    }
}

fn setting_from_level_filter(level: LevelFilter) -> LogLevelSetting {
    match level {
        LevelFilter::OFF | LevelFilter::ERROR => LogLevelSetting::Error,
        LevelFilter::WARN => LogLevelSetting::Warn,
        LevelFilter::INFO => LogLevelSetting::Info,
        LevelFilter::DEBUG => LogLevelSetting::Debug,
        LevelFilter::TRACE => LogLevelSetting::Trace,
    }
}
