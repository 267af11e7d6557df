use std::path::Path;
use std::process;

use eframe::egui;

mod app;
mod headless;
mod node_graph;
mod worker;

use app::{AppConfig, EditorApp, CONFIG_PATH};

fn main() -> eframe::Result<()> {
    let (config, config_error) = match AppConfig::load(Path::new(CONFIG_PATH)) {
        Ok(config) => (config, None),
        Err(err) => (AppConfig::default(), Some(err)),
    };
    let (console, log_level_state) = app::setup_tracing(config.editor.log_level);
    if let Some(err) = config_error {
        tracing::warn!("using default config: {}", err);
    }

    tracing::info!("loom starting");

    let args: Vec<String> = std::env::args().collect();
    match headless::maybe_run_headless(&args, &config.store) {
        Ok(true) => return Ok(()),
        Ok(false) => {}
        Err(err) => {
            eprintln!("headless error: {err}");
            process::exit(1);
        }
    }

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1400.0, 900.0]),
        renderer: eframe::Renderer::Wgpu,
        ..Default::default()
    };
    eframe::run_native(
        "loom",
        native_options,
        Box::new(move |cc| {
            Ok(Box::new(EditorApp::new(
                config,
                console,
                log_level_state,
                Some(cc.egui_ctx.clone()),
            )))
        }),
    )
}
