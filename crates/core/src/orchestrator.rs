//! Owns the active session and dispatches classified uploads to a workflow.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::backend::{Backend, UploadSource};
use crate::board::BoardWorkflow;
use crate::data::DataWorkflow;
use crate::error::{StepError, UploadError};
use crate::identity::{classify, Identity};
use crate::step::StepKind;
use crate::view::DialogView;

/// Monotonic session number; a higher id supersedes every lower one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Workflow of the active session.
#[derive(Clone)]
pub enum Workflow {
    /// Check then update.
    Board(Arc<BoardWorkflow>),
    /// Auto-started processing.
    Data(Arc<DataWorkflow>),
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Workflow").field(&self.identity()).finish()
    }
}

impl Workflow {
    /// Identity the session was opened for.
    pub fn identity(&self) -> Identity {
        match self {
            Workflow::Board(w) => Identity::Board(*w.identity()),
            Workflow::Data(w) => Identity::Data(*w.identity()),
        }
    }

    /// Terminal success of the session's last step.
    pub fn is_complete(&self) -> bool {
        match self {
            Workflow::Board(w) => w.state().is_complete(),
            Workflow::Data(w) => w.state().is_complete(),
        }
    }

    /// Typed error of the failed step, if one is failed.
    pub fn failure(&self) -> Option<StepError> {
        match self {
            Workflow::Board(w) => {
                let state = w.state();
                state.check.error(StepKind::Check).or_else(|| state.update.error(StepKind::Update))
            }
            Workflow::Data(w) => w.state().process.error(StepKind::Process),
        }
    }

    /// Dialog snapshot of the current state.
    pub fn view(&self) -> DialogView {
        match self {
            Workflow::Board(w) => DialogView::board(w.identity(), &w.state()),
            Workflow::Data(w) => DialogView::data(w.identity(), &w.state()),
        }
    }
}

/// The one session the operator currently sees (or has hidden).
#[derive(Debug, Clone)]
pub struct Session {
    /// Session number.
    pub id: SessionId,
    /// Workflow chosen by the identity kind.
    pub workflow: Workflow,
    /// Whether the dialog is shown. Hidden sessions keep their state.
    pub visible: bool,
}

/// Result of dismissing the dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Terminal success: identity and step states discarded.
    Cleared,
    /// Dialog hidden; the session can be reopened and resumed.
    Hidden,
    /// Nothing was open.
    NoSession,
}

/// Settings applied to every workflow the orchestrator opens.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowOptions {
    /// Passed as the force flag of every ranking update.
    pub force_update: bool,
}

/// Entry point of the upload flow. At most one session exists at a time.
pub struct Orchestrator {
    backend: Arc<dyn Backend>,
    options: WorkflowOptions,
    next_id: AtomicU64,
    session: watch::Sender<Option<Session>>,
}

impl Orchestrator {
    /// Orchestrator with no session open.
    pub fn new(backend: Arc<dyn Backend>, options: WorkflowOptions) -> Self {
        Self {
            backend,
            options,
            next_id: AtomicU64::new(1),
            session: watch::Sender::new(None),
        }
    }

    /// Classifies, transfers, then opens a session for the file.
    ///
    /// Classification runs first: a file that matches neither layout is never
    /// sent and no session is touched.
    pub async fn upload(
        &self,
        source: &UploadSource,
        progress: mpsc::UnboundedSender<f64>,
    ) -> Result<Session, UploadError> {
        let identity = classify(&source.file_name)?;
        tracing::info!(file = %source.file_name, identity = %identity, bytes = source.contents.len(), "uploading");

        self.backend.upload_file(source, progress).await.map_err(|e| {
            let message = e.upload_message(StepKind::Upload.default_failure());
            tracing::warn!(file = %source.file_name, error = %message, "upload failed");
            UploadError::Transfer(message)
        })?;

        Ok(self.on_upload_complete(identity))
    }

    /// Opens a fresh session for `identity`, superseding any previous one.
    ///
    /// A data session's process step is already `Loading` when this returns.
    /// Calls still in flight for the previous session keep running but are
    /// no longer observed. Must be called from within a Tokio runtime.
    pub fn on_upload_complete(&self, identity: Identity) -> Session {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let workflow = match identity {
            Identity::Board(board) => Workflow::Board(Arc::new(BoardWorkflow::new(
                board,
                Arc::clone(&self.backend),
                self.options.force_update,
            ))),
            Identity::Data(data) => {
                let workflow = Arc::new(DataWorkflow::new(data, Arc::clone(&self.backend)));
                // The spawned task is abandoned together with the session.
                let _ = workflow.start();
                Workflow::Data(workflow)
            }
        };

        let session = Session {
            id,
            workflow,
            visible: true,
        };
        if let Some(previous) = self.session.send_replace(Some(session.clone())) {
            tracing::debug!(previous = %previous.id, session = %id, "session superseded");
        }
        tracing::info!(session = %id, identity = %identity, "session opened");
        session
    }

    /// The open session, visible or hidden.
    pub fn current(&self) -> Option<Session> {
        self.session.borrow().clone()
    }

    /// Whether `id` is still the open session.
    pub fn is_current(&self, id: SessionId) -> bool {
        self.session.borrow().as_ref().is_some_and(|s| s.id == id)
    }

    /// Receiver notified when a session is opened, hidden, reopened or cleared.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }

    /// Dismisses the dialog. Clears the session only on terminal success.
    pub fn close(&self) -> CloseOutcome {
        let mut outcome = CloseOutcome::NoSession;
        self.session.send_if_modified(|slot| {
            let Some(session) = slot.as_mut() else {
                return false;
            };
            if session.workflow.is_complete() {
                tracing::info!(session = %session.id, "session completed and cleared");
                *slot = None;
                outcome = CloseOutcome::Cleared;
            } else {
                session.visible = false;
                outcome = CloseOutcome::Hidden;
            }
            true
        });
        outcome
    }

    /// Shows a hidden session again. False when there is nothing to show.
    pub fn reopen(&self) -> bool {
        self.session.send_if_modified(|slot| match slot.as_mut() {
            Some(session) if !session.visible => {
                session.visible = true;
                true
            }
            _ => false,
        });
        self.session.borrow().as_ref().is_some_and(|s| s.visible)
    }
}
