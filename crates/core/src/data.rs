//! Data (snapshot) file workflow: a single process step, started on open.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::backend::Backend;
use crate::identity::DataIdentity;
use crate::step::{RunOutcome, Slot, Step, StepKind, StepState, StepStatus};

/// Step state of one data session.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct DataState {
    /// Snapshot processing step.
    pub process: StepState,
}

/// Where a data session stands.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DataPhase {
    /// Not started yet.
    Idle,
    /// Processing in flight.
    Running,
    /// Terminal success.
    Succeeded,
    /// Processing failed; retry it.
    Failed,
}

impl DataState {
    /// Phase of the single step.
    pub fn phase(&self) -> DataPhase {
        match self.process.status {
            StepStatus::Idle => DataPhase::Idle,
            StepStatus::Loading => DataPhase::Running,
            StepStatus::Success => DataPhase::Succeeded,
            StepStatus::Failed => DataPhase::Failed,
        }
    }

    /// Terminal success; closing the dialog now clears the session.
    pub fn is_complete(&self) -> bool {
        self.process.status == StepStatus::Success
    }

    fn process(&self) -> &StepState {
        &self.process
    }

    fn process_mut(&mut self) -> &mut StepState {
        &mut self.process
    }
}

/// Drives the process step of a snapshot file.
pub struct DataWorkflow {
    identity: DataIdentity,
    backend: Arc<dyn Backend>,
    state: Arc<watch::Sender<DataState>>,
    process: Step<DataState>,
}

impl DataWorkflow {
    /// Fresh workflow; call [`DataWorkflow::start`] to begin processing.
    pub fn new(identity: DataIdentity, backend: Arc<dyn Backend>) -> Self {
        let state = Arc::new(watch::Sender::new(DataState::default()));
        let process = Step::new(
            StepKind::Process,
            Arc::clone(&state),
            Slot {
                get: DataState::process,
                get_mut: DataState::process_mut,
            },
        );
        Self {
            identity,
            backend,
            state,
            process,
        }
    }

    /// The snapshot this session works on.
    pub fn identity(&self) -> &DataIdentity {
        &self.identity
    }

    /// Current snapshot of the step.
    pub fn state(&self) -> DataState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every transition.
    pub fn subscribe(&self) -> watch::Receiver<DataState> {
        self.state.subscribe()
    }

    /// Moves the step to `Running` before returning and drives the call on a
    /// spawned task. `None` if the step was already started.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(self: &Arc<Self>) -> Option<JoinHandle<RunOutcome>> {
        let attempt = self.process.begin()?;
        let workflow = Arc::clone(self);
        Some(tokio::spawn(async move {
            workflow
                .process
                .drive(attempt, |_| workflow.call_process())
                .await
        }))
    }

    /// Re-runs a failed process step.
    pub async fn retry(&self) -> RunOutcome {
        self.process.retry(|_| self.call_process()).await
    }

    async fn call_process(&self) -> Result<(), String> {
        let date = self.identity.date_key();
        tracing::debug!(date = %date, "processing snapshot");
        self.backend
            .update_snapshot(&date)
            .await
            .map_err(|e| e.step_message(StepKind::Process.default_failure()))
    }
}
