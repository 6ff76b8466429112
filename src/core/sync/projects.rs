use tokio::sync::watch;
use tracing::error;

use crate::{
    core::{
        auth::AuthProvider,
        db::{DocumentStore, DocumentWrite, Gateway, StoreResult},
        sync::{CollectionSync, SyncedRecord},
    },
    models::{PROJECTS, Project, ProjectUpdate},
};

pub const PROJECT_NOT_FOUND: &str = "Project not found; it may have been deleted.";
pub const LOAD_FAILED: &str = "Failed to load data.";

impl SyncedRecord for Project {
    const COLLECTION: &'static str = PROJECTS;
    const ORDER_FIELD: &'static str = "createdAt";
    const LOAD_ERROR: &'static str = "Unable to load the project list.";
}

/// Live project list, newest first.
pub type Projects<S, A> = CollectionSync<Project, S, A>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectDetailState {
    pub project: Option<Project>,
    pub loading: bool,
    pub error: Option<String>,
}

/// One project loaded on demand, without a live subscription.
pub struct ProjectDetail<S, A> {
    gateway: Gateway<S, A>,
    state: watch::Sender<ProjectDetailState>,
}

impl<S: DocumentStore, A: AuthProvider> ProjectDetail<S, A> {
    pub fn new(gateway: Gateway<S, A>) -> Self {
        let (state, _) = watch::channel(ProjectDetailState::default());
        Self { gateway, state }
    }

    /// One-shot read. Missing documents and read failures end up in `error`.
    pub async fn fetch(&self, id: &str) {
        self.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
        });

        let result = self.gateway.get_document(PROJECTS, id).await;
        self.state.send_modify(|state| {
            match result.and_then(|doc| doc.map(|doc| doc.decode::<Project>()).transpose()) {
                Ok(Some(project)) => state.project = Some(project),
                Ok(None) => state.error = Some(PROJECT_NOT_FOUND.to_string()),
                Err(err) => {
                    error!(id, error = %err, "failed to load project");
                    state.error = Some(LOAD_FAILED.to_string());
                }
            }
            state.loading = false;
        });
    }

    /// Apply `update` locally, then write it.
    ///
    /// The local record reflects the change before the write completes. If the
    /// write fails, the fields this update changed are put back and the error
    /// is returned; changes from other updates are kept.
    pub async fn update(&self, id: &str, update: &ProjectUpdate) -> StoreResult<()> {
        let write = DocumentWrite::from_record(update)?;
        let mut before = None;
        self.state.send_if_modified(|state| match state.project.as_mut() {
            Some(project) if project.id.as_deref() == Some(id) => {
                before = Some(project.clone());
                update.apply_to(project);
                true
            }
            _ => false,
        });

        match self.gateway.update_document(PROJECTS, id, write).await {
            Ok(()) => Ok(()),
            Err(err) => {
                error!(id, error = %err, "failed to update project");
                if let Some(before) = before {
                    self.state.send_if_modified(|state| match state.project.as_mut() {
                        Some(project) if project.id.as_deref() == Some(id) => {
                            update.revert_on(project, &before);
                            true
                        }
                        _ => false,
                    });
                }
                Err(err)
            }
        }
    }

    /// Delete the project. The local record is left as it was.
    pub async fn delete(&self, id: &str) -> StoreResult<()> {
        self.gateway
            .delete_document(PROJECTS, id)
            .await
            .inspect_err(|err| error!(id, error = %err, "failed to delete project"))
    }

    pub fn project(&self) -> Option<Project> {
        self.state.borrow().project.clone()
    }

    pub fn state(&self) -> ProjectDetailState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProjectDetailState> {
        self.state.subscribe()
    }
}
