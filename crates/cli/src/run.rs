//! Non-interactive driving of an opened session.

use std::future::Future;
use std::time::Duration;

use rankctl_core::{BoardWorkflow, DataPhase, DataWorkflow, RunOutcome, StepKind, Workflow};
use tokio::sync::{mpsc, watch};

use crate::config::WorkflowConfig;

/// Delay before attempt `attempt` (1-based) of a failed step.
///
/// Attempt 1: immediate
/// Attempt 2: 2s
/// Attempt 3: 5s
/// Attempt 4+: 10s
pub fn retry_backoff(attempt: u32) -> Duration {
    let secs = match attempt {
        0 | 1 => 0,
        2 => 2,
        3 => 5,
        _ => 10,
    };
    Duration::from_secs(secs)
}

#[derive(Clone, Copy)]
pub struct Policy {
    pub max_attempts: u32,
    pub auto_update: bool,
    pub backoff: fn(u32) -> Duration,
}

impl From<&WorkflowConfig> for Policy {
    fn from(cfg: &WorkflowConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            auto_update: cfg.auto_update,
            backoff: retry_backoff,
        }
    }
}

/// Runs `first`, then `again` while it keeps failing, up to `max_attempts` calls in total.
pub async fn with_retries<F, FF, R, RF>(step: StepKind, policy: Policy, first: F, mut again: R) -> RunOutcome
where
    F: FnOnce() -> FF,
    FF: Future<Output = RunOutcome>,
    R: FnMut() -> RF,
    RF: Future<Output = RunOutcome>,
{
    let mut outcome = first().await;
    let mut attempt = 1;
    while let RunOutcome::Failed(message) = &outcome {
        if attempt >= policy.max_attempts {
            break;
        }
        attempt += 1;
        let delay = (policy.backoff)(attempt);
        tracing::warn!(step = %step, attempt, delay_ms = delay.as_millis() as u64, error = %message, "retrying");
        tokio::time::sleep(delay).await;
        outcome = again().await;
    }
    outcome
}

/// Check, then update when the policy allows it.
pub async fn drive_board(board: &BoardWorkflow, policy: Policy) -> RunOutcome {
    let printer = print_progress(board.subscribe(), |s| s.progress_line().map(str::to_string));
    let drive = async {
        let check = with_retries(StepKind::Check, policy, || board.run_check(), || board.retry_check()).await;
        if !matches!(check, RunOutcome::Succeeded | RunOutcome::Skipped) || !policy.auto_update {
            return check;
        }
        with_retries(StepKind::Update, policy, || board.run_update(), || board.retry_update()).await
    };
    until_done(drive, printer).await
}

/// Waits for the auto-started process step, then retries it while it fails.
pub async fn drive_data(data: &DataWorkflow, policy: Policy) -> RunOutcome {
    let first = move || async move {
        let mut rx = data.subscribe();
        let settled = match rx.wait_for(|s| s.phase() != DataPhase::Running).await {
            Ok(state) => Some(state.clone()),
            Err(_) => None,
        };
        match settled {
            Some(state) if state.phase() == DataPhase::Succeeded => RunOutcome::Succeeded,
            Some(state) if state.phase() == DataPhase::Failed => RunOutcome::Failed(state.process.error_message),
            _ => RunOutcome::Skipped,
        }
    };
    with_retries(StepKind::Process, policy, first, || data.retry()).await
}

pub async fn drive(workflow: &Workflow, policy: Policy) -> RunOutcome {
    match workflow {
        Workflow::Board(board) => drive_board(board, policy).await,
        Workflow::Data(data) => drive_data(data, policy).await,
    }
}

/// Prints upload percentages until the sender side is dropped.
pub async fn print_upload_progress(mut rx: mpsc::UnboundedReceiver<f64>) {
    let mut last = None;
    while let Some(fraction) = rx.recv().await {
        let percent = (fraction.clamp(0.0, 1.0) * 100.0).round() as u32;
        if last != Some(percent) {
            println!("upload {percent:>3}%");
            last = Some(percent);
        }
    }
}

async fn print_progress<S>(mut rx: watch::Receiver<S>, line: fn(&S) -> Option<String>) {
    let mut last: Option<String> = None;
    loop {
        let current = line(&rx.borrow_and_update());
        if current.is_some() && current != last {
            if let Some(text) = &current {
                println!("  {text}");
            }
        }
        last = current;
        if rx.changed().await.is_err() {
            return;
        }
    }
}

async fn until_done<D>(drive: D, printer: impl Future<Output = ()>) -> RunOutcome
where
    D: Future<Output = RunOutcome>,
{
    tokio::pin!(drive);
    tokio::select! {
        biased;
        outcome = &mut drive => outcome,
        () = printer => drive.await,
    }
}
