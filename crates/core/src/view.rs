//! Render-ready snapshot of a session dialog.

use serde::Serialize;

use crate::board::BoardState;
use crate::data::DataState;
use crate::identity::{BoardIdentity, DataIdentity};
use crate::step::{StepKind, StepState, StepStatus};

/// Action button offered on a step row.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    /// Start an idle step.
    Run,
    /// Re-run a failed step.
    Retry,
}

/// One status row of the dialog.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StepRow {
    /// Step shown on this row.
    pub kind: StepKind,
    /// Row label.
    pub label: &'static str,
    /// Current status.
    pub status: StepStatus,
    /// Inline failure message.
    pub error: Option<String>,
    /// Button offered, if any.
    pub action: Option<StepAction>,
    /// Greyed out: the step cannot start yet.
    pub disabled: bool,
}

impl StepRow {
    fn new(kind: StepKind, state: &StepState, run_offered: bool, disabled: bool) -> Self {
        let action = match state.status {
            StepStatus::Idle if run_offered => Some(StepAction::Run),
            StepStatus::Failed => Some(StepAction::Retry),
            _ => None,
        };
        Self {
            kind,
            label: kind.label(),
            status: state.status,
            error: (!state.error_message.is_empty()).then(|| state.error_message.clone()),
            action: if disabled { None } else { action },
            disabled,
        }
    }
}

/// Everything a dialog shows for one session.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DialogView {
    /// Dialog title, by file kind.
    pub title: &'static str,
    /// Identity line.
    pub header: String,
    /// One row per step, in order.
    pub rows: Vec<StepRow>,
    /// Latest update line while the update is running.
    pub progress: Option<String>,
    /// `完成` on terminal success, `关闭` otherwise.
    pub dismiss_label: &'static str,
    /// Whether the dismiss button can be pressed.
    pub dismiss_enabled: bool,
}

const DISMISS_DONE: &str = "完成";
const DISMISS_CLOSE: &str = "关闭";

impl DialogView {
    /// Board dialog. The update row stays disabled until the check succeeded.
    pub fn board(identity: &BoardIdentity, state: &BoardState) -> Self {
        let update_disabled = state.check.status != StepStatus::Success;
        Self {
            title: "排名文件",
            header: identity.header(),
            rows: vec![
                StepRow::new(StepKind::Check, &state.check, true, false),
                StepRow::new(StepKind::Update, &state.update, true, update_disabled),
            ],
            progress: state.progress_line().map(str::to_string),
            dismiss_label: if state.is_complete() { DISMISS_DONE } else { DISMISS_CLOSE },
            dismiss_enabled: true,
        }
    }

    /// The process step has no manual start; only retry is offered.
    pub fn data(identity: &DataIdentity, state: &DataState) -> Self {
        Self {
            title: "数据文件",
            header: identity.to_string(),
            rows: vec![StepRow::new(StepKind::Process, &state.process, false, false)],
            progress: None,
            dismiss_label: if state.is_complete() { DISMISS_DONE } else { DISMISS_CLOSE },
            dismiss_enabled: state.process.status != StepStatus::Loading,
        }
    }
}
