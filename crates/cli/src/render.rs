//! Terminal rendering of dialogs and identities.

use std::fmt::Write;

use rankctl_core::{DialogView, Identity, StepAction, StepStatus};

fn marker(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Idle => "[ ]",
        StepStatus::Loading => "[~]",
        StepStatus::Success => "[x]",
        StepStatus::Failed => "[!]",
    }
}

/// Plain-text rendering of a session dialog.
pub fn dialog(view: &DialogView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} | {}", view.title, view.header);
    for row in &view.rows {
        let _ = write!(out, "  {} {}", marker(row.status), row.label);
        if row.disabled {
            out.push_str(" (waiting)");
        }
        if let Some(error) = &row.error {
            let _ = write!(out, ": {error}");
        }
        match row.action {
            Some(StepAction::Run) => out.push_str("  -> run"),
            Some(StepAction::Retry) => out.push_str("  -> retry"),
            None => {}
        }
        out.push('\n');
    }
    if let Some(progress) = &view.progress {
        let _ = writeln!(out, "  > {progress}");
    }
    let _ = write!(out, "[{}]", view.dismiss_label);
    if !view.dismiss_enabled {
        out.push_str(" (busy)");
    }
    out
}

/// One-line description of a classified file.
pub fn identity(identity: &Identity) -> String {
    match identity {
        Identity::Board(board) => format!("board  {}  ({board})", board.header()),
        Identity::Data(data) => format!("data   {data}"),
    }
}
