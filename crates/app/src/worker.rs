use std::sync::mpsc;
use std::thread;

use eframe::egui;
use loom_core::{
    FabricId, FabricPayload, FabricSummary, Light, ProjectId, ProjectSummary, RequestTicket,
    SaveTicket, SessionSnapshot,
};
use loom_store::save::{save_fabric, save_lights, SavedFabric};
use loom_store::{FabricStore, JsonDirStore, LocalBlobStore, ProjectStore, StoreConfig, StoredProject};

/// Action name reported when a fabric save fails.
pub(crate) const SAVE_FABRIC: &str = "save fabric";

pub(crate) enum Job {
    SaveFabric {
        ticket: SaveTicket,
        snapshot: SessionSnapshot,
    },
    LoadFabric {
        ticket: RequestTicket,
        id: FabricId,
    },
    SaveLights {
        name: String,
        lights: Vec<Light>,
    },
    LoadProject {
        ticket: RequestTicket,
        id: ProjectId,
    },
    LoadDefaultProject {
        ticket: RequestTicket,
    },
    SetDefaultProject {
        id: ProjectId,
    },
    Refresh,
}

pub(crate) enum Reply {
    FabricSaved {
        ticket: SaveTicket,
        saved: SavedFabric,
    },
    FabricLoaded {
        ticket: RequestTicket,
        id: FabricId,
        payload: FabricPayload,
    },
    LightsSaved(ProjectId),
    ProjectLoaded {
        ticket: RequestTicket,
        project: StoredProject,
    },
    DefaultSet(ProjectId),
    Listing {
        fabrics: Vec<FabricSummary>,
        projects: Vec<ProjectSummary>,
    },
    Failed {
        action: &'static str,
        message: String,
    },
}

/// Runs store calls on a dedicated thread with its own tokio runtime.
pub(crate) struct Worker {
    jobs: mpsc::Sender<Job>,
    replies: mpsc::Receiver<Reply>,
}

impl Worker {
    pub(crate) fn spawn(config: &StoreConfig, repaint: Option<egui::Context>) -> std::io::Result<Self> {
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (reply_tx, reply_rx) = mpsc::channel::<Reply>();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let (documents, blobs) = config.open();

        thread::Builder::new()
            .name("loom-store".to_string())
            .spawn(move || {
                while let Ok(job) = job_rx.recv() {
                    let reply = runtime.block_on(handle_job(job, &documents, &blobs));
                    if reply_tx.send(reply).is_err() {
                        break;
                    }
                    if let Some(ctx) = &repaint {
                        ctx.request_repaint();
                    }
                }
                tracing::debug!("store worker stopped");
            })?;

        Ok(Self {
            jobs: job_tx,
            replies: reply_rx,
        })
    }

    pub(crate) fn submit(&self, job: Job) {
        if self.jobs.send(job).is_err() {
            tracing::error!("store worker is not running");
        }
    }

    pub(crate) fn poll(&self) -> Vec<Reply> {
        self.replies.try_iter().collect()
    }
}

async fn handle_job(job: Job, documents: &JsonDirStore, blobs: &LocalBlobStore) -> Reply {
    match job {
        Job::SaveFabric { ticket, snapshot } => {
            match save_fabric(&snapshot, blobs, documents, snapshot.fabric_id).await {
                Ok(saved) => Reply::FabricSaved { ticket, saved },
                Err(err) => failed(SAVE_FABRIC, err),
            }
        }
        Job::LoadFabric { ticket, id } => match documents.get_fabric(id).await {
            Ok(stored) => Reply::FabricLoaded {
                ticket,
                id,
                payload: stored.fabric,
            },
            Err(err) => failed("load fabric", err),
        },
        Job::SaveLights { name, lights } => match save_lights(&name, &lights, documents).await {
            Ok(id) => Reply::LightsSaved(id),
            Err(err) => failed("save lights", err),
        },
        Job::LoadProject { ticket, id } => match documents.get_project(id).await {
            Ok(project) => Reply::ProjectLoaded { ticket, project },
            Err(err) => failed("load project", err),
        },
        Job::LoadDefaultProject { ticket } => match documents.get_default_project().await {
            Ok(project) => Reply::ProjectLoaded { ticket, project },
            Err(err) => failed("load default project", err),
        },
        Job::SetDefaultProject { id } => match documents.set_default_project(id).await {
            Ok(()) => Reply::DefaultSet(id),
            Err(err) => failed("set default project", err),
        },
        Job::Refresh => {
            let fabrics = documents.list_fabrics().await;
            let projects = documents.list_projects().await;
            match (fabrics, projects) {
                (Ok(fabrics), Ok(projects)) => Reply::Listing { fabrics, projects },
                (Err(err), _) | (_, Err(err)) => failed("list records", err),
            }
        }
    }
}

fn failed(action: &'static str, err: impl std::fmt::Display) -> Reply {
    tracing::error!("{} failed: {}", action, err);
    Reply::Failed {
        action,
        message: err.to_string(),
    }
}
