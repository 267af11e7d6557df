//! `--headless` mode: build a fabric from a JSON plan and persist it without a window.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::process;

use loom_core::{Asset, EditorSession, LightKind, LightUpdate, ParamValue, ProjectId};
use loom_store::save::{save_fabric, save_lights};
use loom_store::{FabricStore, ProjectStore, StoreConfig, StoredFabric};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HeadlessPlan {
    fabric_name: String,
    fabric_color: Option<String>,
    nodes: Vec<PlanNode>,
    connections: Vec<PlanConnection>,
    params: BTreeMap<String, ParamValue>,
    lights: Vec<PlanLight>,
    /// Lights are stored as a project only when this is set.
    project_name: Option<String>,
    set_default: bool,
}

#[derive(Debug, Deserialize)]
struct PlanNode {
    name: String,
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlanConnection {
    node: String,
    slot: String,
}

#[derive(Debug, Deserialize)]
struct PlanLight {
    kind: LightKind,
    #[serde(flatten)]
    update: LightUpdate,
}

struct HeadlessArgs {
    plan_path: Option<PathBuf>,
    store_dir: Option<PathBuf>,
    print: bool,
}

struct HeadlessOutcome {
    fabric: StoredFabric,
    project: Option<ProjectId>,
}

pub(crate) fn maybe_run_headless(args: &[String], store: &StoreConfig) -> Result<bool, String> {
    if !args.iter().any(|arg| arg == "--headless") {
        return Ok(false);
    }

    let parsed = parse_headless_args(args)?;
    let (plan, base_dir) = match &parsed.plan_path {
        Some(path) => (
            load_headless_plan(path)?,
            path.parent().map(Path::to_path_buf).unwrap_or_default(),
        ),
        None => (default_headless_plan(), PathBuf::new()),
    };
    let config = match &parsed.store_dir {
        Some(dir) => StoreConfig::rooted_at(dir),
        None => store.clone(),
    };

    let session = build_session(&plan, &base_dir)?;
    let outcome = run_plan(&session, &plan, &config)?;
    tracing::info!(
        "headless: stored fabric {} in {:?}",
        outcome.fabric.id.0,
        config.data_dir
    );
    if let Some(id) = outcome.project {
        tracing::info!("headless: stored lights as project {}", id.0);
    }

    if parsed.print {
        let json =
            serde_json::to_string_pretty(&outcome.fabric).map_err(|err| err.to_string())?;
        println!("{json}");
    }

    tracing::info!("headless: completed");
    Ok(true)
}

fn parse_headless_args(args: &[String]) -> Result<HeadlessArgs, String> {
    let mut plan_path = None;
    let mut store_dir = None;
    let mut print = false;
    let mut iter = args.iter().peekable();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--headless" => {}
            "--plan" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "--plan requires a path".to_string())?;
                plan_path = Some(PathBuf::from(value));
            }
            "--store" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "--store requires a directory".to_string())?;
                store_dir = Some(PathBuf::from(value));
            }
            "--print" => {
                print = true;
            }
            "--help" => {
                print_headless_help();
                process::exit(0);
            }
            _ => {}
        }
    }

    Ok(HeadlessArgs {
        plan_path,
        store_dir,
        print,
    })
}

fn print_headless_help() {
    println!("Headless mode options:\n  --headless\n  --plan <path>\n  --store <dir>\n  --print");
}

fn load_headless_plan(path: &Path) -> Result<HeadlessPlan, String> {
    let data = std::fs::read(path).map_err(|err| err.to_string())?;
    serde_json::from_slice(&data).map_err(|err| err.to_string())
}

fn default_headless_plan() -> HeadlessPlan {
    HeadlessPlan {
        fabric_name: "Headless Twill".to_string(),
        fabric_color: None,
        nodes: vec![
            PlanNode {
                name: "weave".to_string(),
                path: None,
                url: Some("https://example.com/textures/twill_diffuse.png".to_string()),
            },
            PlanNode {
                name: "weave_normal".to_string(),
                path: None,
                url: Some("https://example.com/textures/twill_normal.png".to_string()),
            },
        ],
        connections: vec![
            PlanConnection {
                node: "weave".to_string(),
                slot: "Diffuse".to_string(),
            },
            PlanConnection {
                node: "weave_normal".to_string(),
                slot: "Normal".to_string(),
            },
        ],
        params: BTreeMap::from([
            ("roughness".to_string(), ParamValue::Float(0.8)),
            ("sheenIntensity".to_string(), ParamValue::Float(0.4)),
        ]),
        lights: vec![
            PlanLight {
                kind: LightKind::Ambient,
                update: LightUpdate {
                    intensity: Some(0.4),
                    ..LightUpdate::default()
                },
            },
            PlanLight {
                kind: LightKind::Directional,
                update: LightUpdate {
                    intensity: Some(1.5),
                    position: Some([3.0, 5.0, 2.0]),
                    ..LightUpdate::default()
                },
            },
        ],
        project_name: Some("Headless Studio".to_string()),
        set_default: false,
    }
}

fn build_session(plan: &HeadlessPlan, base_dir: &Path) -> Result<EditorSession, String> {
    let mut session = EditorSession::new();
    session.set_fabric_name(plan.fabric_name.clone());

    let mut name_to_id = HashMap::new();
    for node in &plan.nodes {
        let asset = match (&node.path, &node.url) {
            (Some(path), _) => {
                let path = base_dir.join(path);
                Asset::from_path(&path)
                    .map_err(|err| format!("failed to read {}: {}", path.display(), err))?
            }
            (None, Some(url)) => Asset::url(url.clone()),
            (None, None) => return Err(format!("node {} needs a path or url", node.name)),
        };
        let id = session.create_source_node();
        session.attach_asset(id, asset);
        name_to_id.insert(node.name.as_str(), id);
    }

    for connection in &plan.connections {
        let node = name_to_id
            .get(connection.node.as_str())
            .ok_or_else(|| format!("unknown node {}", connection.node))?;
        session
            .connect_named(*node, &connection.slot)
            .map_err(|err| format!("{} -> {}: {}", connection.node, connection.slot, err))?;
    }

    for (name, value) in &plan.params {
        session.set_parameter(name.clone(), value.clone());
    }

    match &plan.fabric_color {
        Some(color) => session.set_fabric_color(color.clone()),
        None => {
            if let Some(color) = session.suggested_color() {
                session.set_fabric_color(color);
            }
        }
    }

    for light in &plan.lights {
        let id = session
            .lights_mut()
            .add_light_of(light.kind)
            .map_err(|err| err.to_string())?;
        session.lights_mut().update_light(id, &light.update);
    }

    Ok(session)
}

fn run_plan(
    session: &EditorSession,
    plan: &HeadlessPlan,
    config: &StoreConfig,
) -> Result<HeadlessOutcome, String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| err.to_string())?;
    let (documents, blobs) = config.open();
    let snapshot = session.snapshot();

    runtime.block_on(async {
        let id = save_fabric(&snapshot, &blobs, &documents, None)
            .await
            .map_err(|err| format!("save fabric: {err}"))?
            .id;
        let fabric = documents
            .get_fabric(id)
            .await
            .map_err(|err| format!("read back fabric: {err}"))?;

        let project = match &plan.project_name {
            Some(name) if !snapshot.lights.is_empty() => {
                let id = save_lights(name, &snapshot.lights, &documents)
                    .await
                    .map_err(|err| format!("save lights: {err}"))?;
                if plan.set_default {
                    documents
                        .set_default_project(id)
                        .await
                        .map_err(|err| format!("set default project: {err}"))?;
                }
                Some(id)
            }
            _ => None,
        };

        Ok(HeadlessOutcome { fabric, project })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_core::{ConnectionError, Slot};

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn windowed_launch_is_not_headless() {
        let store = StoreConfig::default();
        assert_eq!(maybe_run_headless(&args(&["loom"]), &store), Ok(false));
    }

    #[test]
    fn parses_store_and_plan() {
        let parsed =
            parse_headless_args(&args(&["loom", "--headless", "--plan", "p.json", "--store", "out"]))
                .unwrap();
        assert_eq!(parsed.plan_path, Some(PathBuf::from("p.json")));
        assert_eq!(parsed.store_dir, Some(PathBuf::from("out")));
        assert!(!parsed.print);
        assert!(parse_headless_args(&args(&["--store"])).is_err());
    }

    #[test]
    fn default_plan_is_stored() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::rooted_at(dir.path());
        let plan = default_headless_plan();
        let session = build_session(&plan, Path::new("")).unwrap();
        let outcome = run_plan(&session, &plan, &config).unwrap();

        let fabric = &outcome.fabric.fabric;
        assert_eq!(fabric.fabric_name, "Headless Twill");
        assert_eq!(
            fabric.map_url(Slot::Diffuse),
            Some("https://example.com/textures/twill_diffuse.png")
        );
        assert_eq!(
            fabric.map_url(Slot::Normal),
            Some("https://example.com/textures/twill_normal.png")
        );
        assert_eq!(fabric.map_url(Slot::Roughness), None);
        assert_eq!(fabric.params.get("roughness"), Some(&ParamValue::Float(0.8)));
        assert!(outcome.project.is_some());
    }

    #[test]
    fn file_nodes_resolve_against_plan_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("linen.png"), b"not really a png").unwrap();
        let plan: HeadlessPlan = serde_json::from_str(
            r##"{
                "fabric_name": "Linen",
                "fabric_color": "#ddccbb",
                "nodes": [{"name": "linen", "path": "linen.png"}],
                "connections": [{"node": "linen", "slot": "Roughness"}],
                "lights": [{"kind": "point", "intensity": 2.0, "cast_shadow": true}],
                "project_name": "Linen lights",
                "set_default": true
            }"##,
        )
        .unwrap();

        let session = build_session(&plan, dir.path()).unwrap();
        assert_eq!(session.fabric_color(), "#ddccbb");
        let light = &session.lights().lights()[0];
        assert_eq!(light.intensity(), 2.0);
        assert!(light.cast_shadow());

        let config = StoreConfig::rooted_at(&dir.path().join("store"));
        let outcome = run_plan(&session, &plan, &config).unwrap();
        let url = outcome
            .fabric
            .fabric
            .map_url(Slot::Roughness)
            .expect("uploaded url");
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("linen.png"));
        assert!(outcome.project.is_some());
    }

    #[test]
    fn bad_plans_are_rejected() {
        let mut plan = default_headless_plan();
        plan.connections.push(PlanConnection {
            node: "missing".to_string(),
            slot: "Diffuse".to_string(),
        });
        let err = build_session(&plan, Path::new("")).err().unwrap();
        assert!(err.contains("unknown node missing"));

        let mut plan = default_headless_plan();
        plan.connections[0].slot = "sparkle".to_string();
        let err = build_session(&plan, Path::new("")).err().unwrap();
        assert!(err.contains(&ConnectionError::UnknownSlot("sparkle".to_string()).to_string()));

        let mut plan = default_headless_plan();
        plan.nodes[0].url = None;
        let err = build_session(&plan, Path::new("")).err().unwrap();
        assert!(err.contains("needs a path or url"));
    }

    #[test]
    fn unnamed_fabric_fails_to_save() {
        let dir = tempfile::tempdir().unwrap();
        let mut plan = default_headless_plan();
        plan.fabric_name = String::new();
        let session = build_session(&plan, Path::new("")).unwrap();
        let err = run_plan(&session, &plan, &StoreConfig::rooted_at(dir.path()))
            .err()
            .unwrap();
        assert!(err.starts_with("save fabric"));
    }
}
