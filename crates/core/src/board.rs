//! Board (ranking) file workflow: check, then update.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};

use crate::backend::{Backend, RankingUpdate};
use crate::identity::BoardIdentity;
use crate::step::{RunOutcome, Slot, Step, StepKind, StepState, StepStatus};

/// Both step states of one board session.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct BoardState {
    /// Validation step.
    pub check: StepState,
    /// Ranking update step; gated on the check.
    pub update: StepState,
}

/// Where a board session stands.
///
/// `UpdatePending` is the state right after the check succeeded.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BoardPhase {
    /// Session open, check not run yet.
    CheckPending,
    /// Check in flight.
    CheckRunning,
    /// Check failed; retry it.
    CheckFailed,
    /// Check passed; update not run yet.
    UpdatePending,
    /// Update in flight, progress lines streaming.
    UpdateRunning,
    /// Update failed; retry it without rechecking.
    UpdateFailed,
    /// Terminal success.
    UpdateSucceeded,
}

impl BoardState {
    /// Combined phase of both steps.
    pub fn phase(&self) -> BoardPhase {
        match (self.check.status, self.update.status) {
            (StepStatus::Idle, _) => BoardPhase::CheckPending,
            (StepStatus::Loading, _) => BoardPhase::CheckRunning,
            (StepStatus::Failed, _) => BoardPhase::CheckFailed,
            (StepStatus::Success, StepStatus::Idle) => BoardPhase::UpdatePending,
            (StepStatus::Success, StepStatus::Loading) => BoardPhase::UpdateRunning,
            (StepStatus::Success, StepStatus::Failed) => BoardPhase::UpdateFailed,
            (StepStatus::Success, StepStatus::Success) => BoardPhase::UpdateSucceeded,
        }
    }

    /// Latest update progress line, only while the update is running.
    pub fn progress_line(&self) -> Option<&str> {
        (self.update.status == StepStatus::Loading && !self.update.progress_text.is_empty())
            .then_some(self.update.progress_text.as_str())
    }

    /// Terminal success; closing the dialog now clears the session.
    pub fn is_complete(&self) -> bool {
        self.update.status == StepStatus::Success
    }

    fn check(&self) -> &StepState {
        &self.check
    }

    fn check_mut(&mut self) -> &mut StepState {
        &mut self.check
    }

    fn update(&self) -> &StepState {
        &self.update
    }

    fn update_mut(&mut self) -> &mut StepState {
        &mut self.update
    }

    fn check_passed(&self) -> bool {
        self.check.status == StepStatus::Success
    }
}

/// Drives the two dependent steps of a board file.
pub struct BoardWorkflow {
    identity: BoardIdentity,
    backend: Arc<dyn Backend>,
    force: bool,
    state: Arc<watch::Sender<BoardState>>,
    check: Step<BoardState>,
    update: Step<BoardState>,
}

impl BoardWorkflow {
    /// Fresh workflow with both steps idle. `force` is sent with every update.
    pub fn new(identity: BoardIdentity, backend: Arc<dyn Backend>, force: bool) -> Self {
        let state = Arc::new(watch::Sender::new(BoardState::default()));
        let check = Step::new(
            StepKind::Check,
            Arc::clone(&state),
            Slot {
                get: BoardState::check,
                get_mut: BoardState::check_mut,
            },
        );
        let update = Step::new(
            StepKind::Update,
            Arc::clone(&state),
            Slot {
                get: BoardState::update,
                get_mut: BoardState::update_mut,
            },
        )
        .gated(BoardState::check_passed);

        Self {
            identity,
            backend,
            force,
            state,
            check,
            update,
        }
    }

    /// The file this session works on.
    pub fn identity(&self) -> &BoardIdentity {
        &self.identity
    }

    /// Current snapshot of both steps.
    pub fn state(&self) -> BoardState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every transition.
    pub fn subscribe(&self) -> watch::Receiver<BoardState> {
        self.state.subscribe()
    }

    /// Runs the check from `Idle` or `Failed`.
    pub async fn run_check(&self) -> RunOutcome {
        self.check.run(|_| self.call_check()).await
    }

    /// Re-runs a failed check.
    pub async fn retry_check(&self) -> RunOutcome {
        self.check.retry(|_| self.call_check()).await
    }

    /// Runs the update. Skipped unless the check has succeeded.
    pub async fn run_update(&self) -> RunOutcome {
        self.update.run(|progress| self.call_update(progress)).await
    }

    /// Re-runs a failed update without repeating the check.
    pub async fn retry_update(&self) -> RunOutcome {
        self.update.retry(|progress| self.call_update(progress)).await
    }

    /// Both steps back to `Idle`. Calls still in flight are orphaned.
    pub fn reset(&self) {
        self.update.reset();
        self.check.reset();
    }

    async fn call_check(&self) -> Result<(), String> {
        let BoardIdentity { board, part, issue } = self.identity;
        tracing::debug!(board = %board, part = %part, issue, "checking board file");
        match self.backend.check_file(board, part, issue).await {
            Ok(report) if report.passed() => Ok(()),
            Ok(report) => Err(report.detail),
            Err(e) => Err(e.step_message(StepKind::Check.default_failure())),
        }
    }

    async fn call_update(&self, progress: mpsc::UnboundedSender<String>) -> Result<(), String> {
        let request = RankingUpdate::new(&self.identity, self.force);
        tracing::debug!(board = %request.board, part = %request.part, issue = request.issue, force = request.force, "updating ranking");
        self.backend
            .update_ranking(&request, progress)
            .await
            .map_err(|e| e.step_message(StepKind::Update.default_failure()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(check: StepStatus, update: StepStatus) -> BoardState {
        BoardState {
            check: StepState::with(check, ""),
            update: StepState::with(update, ""),
        }
    }

    #[test]
    fn phases_follow_step_statuses() {
        use StepStatus::*;
        assert_eq!(state(Idle, Idle).phase(), BoardPhase::CheckPending);
        assert_eq!(state(Loading, Idle).phase(), BoardPhase::CheckRunning);
        assert_eq!(state(Failed, Idle).phase(), BoardPhase::CheckFailed);
        assert_eq!(state(Success, Idle).phase(), BoardPhase::UpdatePending);
        assert_eq!(state(Success, Loading).phase(), BoardPhase::UpdateRunning);
        assert_eq!(state(Success, Failed).phase(), BoardPhase::UpdateFailed);
        assert_eq!(state(Success, Success).phase(), BoardPhase::UpdateSucceeded);
    }

    #[test]
    fn progress_line_only_while_updating() {
        let mut s = state(StepStatus::Success, StepStatus::Loading);
        assert_eq!(s.progress_line(), None);
        s.update.progress_text = "ranking 10/200".into();
        assert_eq!(s.progress_line(), Some("ranking 10/200"));
        s.update.status = StepStatus::Failed;
        assert_eq!(s.progress_line(), None);
    }

    #[test]
    fn only_update_success_is_complete() {
        assert!(!state(StepStatus::Success, StepStatus::Failed).is_complete());
        assert!(state(StepStatus::Success, StepStatus::Success).is_complete());
    }
}
