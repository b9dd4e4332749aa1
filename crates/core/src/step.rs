//! A single asynchronous workflow step with observable status.
//!
//! Step state lives inside a workflow-wide state value held by a
//! [`watch::Sender`]. Every transition replaces that value under the channel
//! lock, so observers always read a consistent snapshot of all steps.
//!
//! Each entry into `Loading` bumps the step's attempt counter. Progress and
//! settlements carry the attempt they belong to and are dropped when the
//! counter has moved on (reset, or a newer attempt).

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};

use crate::error::StepError;

/// Lifecycle of one step.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not started, or reset.
    #[default]
    Idle,
    /// A backend call is in flight.
    Loading,
    /// The last call succeeded.
    Success,
    /// The last call failed; retry is offered.
    Failed,
}

/// Which backend operation a step wraps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// File transfer.
    Upload,
    /// Board file validation.
    Check,
    /// Ranking update.
    Update,
    /// Snapshot processing.
    Process,
}

impl StepKind {
    /// Row label.
    pub fn label(self) -> &'static str {
        match self {
            StepKind::Upload => "上传",
            StepKind::Check => "检查",
            StepKind::Update => "更新",
            StepKind::Process => "处理",
        }
    }

    /// Message used when the backend gives nothing better.
    pub fn default_failure(self) -> &'static str {
        match self {
            StepKind::Upload => "上传失败",
            StepKind::Check => "检查失败",
            StepKind::Update => "更新失败",
            StepKind::Process => "处理失败",
        }
    }

    /// Typed error for a failure message of this kind.
    pub fn error(self, message: impl Into<String>) -> StepError {
        let message = message.into();
        match self {
            StepKind::Upload => StepError::Upload(message),
            StepKind::Check => StepError::CheckFailed(message),
            StepKind::Update => StepError::Update(message),
            StepKind::Process => StepError::Process(message),
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepKind::Upload => "upload",
            StepKind::Check => "check",
            StepKind::Update => "update",
            StepKind::Process => "process",
        };
        f.write_str(name)
    }
}

/// Observable state of one step.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct StepState {
    /// Lifecycle status.
    pub status: StepStatus,
    /// Empty unless `status` is `Failed`.
    pub error_message: String,
    /// Latest progress line of the running attempt.
    pub progress_text: String,
    attempt: u64,
}

impl StepState {
    /// Attempt counter; bumped on every start and reset.
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    /// Retry is only offered after a failure.
    pub fn can_retry(&self) -> bool {
        self.status == StepStatus::Failed
    }

    /// Typed error of a failed step.
    pub fn error(&self, kind: StepKind) -> Option<StepError> {
        (self.status == StepStatus::Failed).then(|| kind.error(self.error_message.clone()))
    }

    #[cfg(test)]
    pub(crate) fn with(status: StepStatus, error_message: &str) -> Self {
        Self {
            status,
            error_message: error_message.to_string(),
            ..Self::default()
        }
    }
}

/// Accessors for one step's state inside a workflow state value.
pub struct Slot<S> {
    /// Shared access.
    pub get: fn(&S) -> &StepState,
    /// Mutable access, used inside transitions.
    pub get_mut: fn(&mut S) -> &mut StepState,
}

impl<S> Clone for Slot<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for Slot<S> {}

/// Token for one entry into `Loading`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt(u64);

/// How a call to [`Step::run`] or [`Step::retry`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The step was not in a state that accepts this action; nothing was called.
    Skipped,
    /// The call succeeded.
    Succeeded,
    /// The call failed with this message.
    Failed(String),
    /// The step was reset while the call was in flight; its result was dropped.
    Superseded,
}

#[derive(Clone, Copy)]
enum Entry {
    Run,
    Retry,
}

/// One named asynchronous action over a shared workflow state `S`.
pub struct Step<S> {
    kind: StepKind,
    state: Arc<watch::Sender<S>>,
    slot: Slot<S>,
    gate: Option<fn(&S) -> bool>,
}

impl<S> Step<S>
where
    S: Send + Sync + 'static,
{
    /// Step of `kind` whose state lives at `slot` inside `state`.
    pub fn new(kind: StepKind, state: Arc<watch::Sender<S>>, slot: Slot<S>) -> Self {
        Self {
            kind,
            state,
            slot,
            gate: None,
        }
    }

    /// Only allow leaving `Idle`/`Failed` while `gate` holds on the workflow state.
    pub fn gated(mut self, gate: fn(&S) -> bool) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Which operation this step wraps.
    pub fn kind(&self) -> StepKind {
        self.kind
    }

    /// Current state of this step.
    pub fn snapshot(&self) -> StepState {
        (self.slot.get)(&self.state.borrow()).clone()
    }

    /// Enters `Loading` from `Idle` or `Failed`. `None` when already running,
    /// already succeeded, or gated.
    pub fn begin(&self) -> Option<Attempt> {
        self.enter(Entry::Run)
    }

    /// Enters `Loading` from `Failed` only.
    pub fn begin_retry(&self) -> Option<Attempt> {
        self.enter(Entry::Retry)
    }

    fn enter(&self, entry: Entry) -> Option<Attempt> {
        let mut started = None;
        self.state.send_if_modified(|s| {
            if let Some(gate) = self.gate {
                if !gate(s) {
                    return false;
                }
            }
            let step = (self.slot.get_mut)(s);
            let allowed = match entry {
                Entry::Run => matches!(step.status, StepStatus::Idle | StepStatus::Failed),
                Entry::Retry => step.status == StepStatus::Failed,
            };
            if !allowed {
                return false;
            }
            let attempt = step.attempt + 1;
            *step = StepState {
                status: StepStatus::Loading,
                error_message: String::new(),
                progress_text: String::new(),
                attempt,
            };
            started = Some(Attempt(attempt));
            true
        });

        match started {
            Some(Attempt(attempt)) => tracing::debug!(step = %self.kind, attempt, "step started"),
            None => tracing::debug!(step = %self.kind, "step not startable; ignoring"),
        }
        started
    }

    /// Replaces the progress line of a running attempt.
    pub fn report(&self, attempt: Attempt, line: String) {
        self.state.send_if_modified(|s| {
            let step = (self.slot.get_mut)(s);
            if step.attempt != attempt.0 || step.status != StepStatus::Loading || step.progress_text == line {
                return false;
            }
            step.progress_text = line;
            true
        });
    }

    /// Applies the result of an attempt. Returns false when the attempt is stale.
    pub fn settle(&self, attempt: Attempt, outcome: Result<(), String>) -> bool {
        let kind = self.kind;
        let applied = self.state.send_if_modified(|s| {
            let step = (self.slot.get_mut)(s);
            if step.attempt != attempt.0 || step.status != StepStatus::Loading {
                return false;
            }
            *step = match &outcome {
                Ok(()) => StepState {
                    status: StepStatus::Success,
                    error_message: String::new(),
                    progress_text: String::new(),
                    attempt: attempt.0,
                },
                Err(message) => StepState {
                    status: StepStatus::Failed,
                    error_message: if message.trim().is_empty() {
                        kind.default_failure().to_string()
                    } else {
                        message.clone()
                    },
                    progress_text: String::new(),
                    attempt: attempt.0,
                },
            };
            true
        });

        match (&outcome, applied) {
            (_, false) => tracing::debug!(step = %kind, attempt = attempt.0, "discarding stale settlement"),
            (Ok(()), true) => tracing::info!(step = %kind, attempt = attempt.0, "step succeeded"),
            (Err(message), true) => {
                tracing::warn!(step = %kind, attempt = attempt.0, error = %message, "step failed")
            }
        }
        applied
    }

    /// Back to `Idle`; anything still in flight for this step is orphaned.
    pub fn reset(&self) {
        self.state.send_modify(|s| {
            let step = (self.slot.get_mut)(s);
            *step = StepState {
                attempt: step.attempt + 1,
                ..StepState::default()
            };
        });
    }

    /// Runs the step from `Idle` or `Failed`.
    pub async fn run<F, Fut>(&self, op: F) -> RunOutcome
    where
        F: FnOnce(mpsc::UnboundedSender<String>) -> Fut,
        Fut: Future<Output = Result<(), String>>,
    {
        match self.begin() {
            Some(attempt) => self.drive(attempt, op).await,
            None => RunOutcome::Skipped,
        }
    }

    /// Same as [`Step::run`], but only from `Failed`.
    pub async fn retry<F, Fut>(&self, op: F) -> RunOutcome
    where
        F: FnOnce(mpsc::UnboundedSender<String>) -> Fut,
        Fut: Future<Output = Result<(), String>>,
    {
        match self.begin_retry() {
            Some(attempt) => self.drive(attempt, op).await,
            None => RunOutcome::Skipped,
        }
    }

    /// Issues the backend call for `attempt`, forwarding progress lines until it settles.
    pub async fn drive<F, Fut>(&self, attempt: Attempt, op: F) -> RunOutcome
    where
        F: FnOnce(mpsc::UnboundedSender<String>) -> Fut,
        Fut: Future<Output = Result<(), String>>,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let call = op(tx);
        tokio::pin!(call);

        let outcome = loop {
            tokio::select! {
                biased;
                Some(line) = rx.recv() => self.report(attempt, line),
                outcome = &mut call => break outcome,
            }
        };

        let succeeded = outcome.is_ok();
        if !self.settle(attempt, outcome) {
            return RunOutcome::Superseded;
        }
        if succeeded {
            RunOutcome::Succeeded
        } else {
            RunOutcome::Failed(self.snapshot().error_message)
        }
    }
}
