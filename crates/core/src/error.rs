//! Error types shared by classification, backend calls and workflow steps.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Filename classification failure. Terminal: the operator has to pick another file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    /// The name matches neither the board nor the date layout.
    #[error("unrecognized filename: {0}")]
    UnrecognizedFilename(String),
    /// The name has the date shape but is not a calendar date.
    #[error("invalid date in filename: {0}")]
    InvalidDate(String),
}

/// Structured error body returned by the backend on non-2xx responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorPayload {
    /// Validation detail.
    #[serde(default)]
    pub detail: Option<String>,
    /// Human message.
    #[serde(default)]
    pub message: Option<String>,
}

/// Failure of a single backend call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{transport}")]
pub struct ServiceError {
    /// HTTP status, when the call reached the server.
    pub status: Option<u16>,
    /// Parsed error body, if any.
    pub payload: Option<ErrorPayload>,
    /// Transport-level message.
    pub transport: String,
}

impl ServiceError {
    /// Error without a response body (connection refused, stream cut, ...).
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            payload: None,
            transport: message.into(),
        }
    }

    /// Error carrying a structured payload.
    pub fn with_payload(status: Option<u16>, payload: ErrorPayload, transport: impl Into<String>) -> Self {
        Self {
            status,
            payload: Some(payload),
            transport: transport.into(),
        }
    }

    /// Message shown beside a failed workflow step:
    /// payload `message`, then payload `detail`, then transport, then `fallback`.
    pub fn step_message(&self, fallback: &str) -> String {
        let payload = self.payload.as_ref();
        first_non_empty([
            payload.and_then(|p| p.message.as_deref()),
            payload.and_then(|p| p.detail.as_deref()),
            Some(self.transport.as_str()),
        ])
        .unwrap_or(fallback)
        .to_string()
    }

    /// Message shown at the upload control:
    /// payload `detail`, then payload `message`, then transport, then `fallback`.
    pub fn upload_message(&self, fallback: &str) -> String {
        let payload = self.payload.as_ref();
        first_non_empty([
            payload.and_then(|p| p.detail.as_deref()),
            payload.and_then(|p| p.message.as_deref()),
            Some(self.transport.as_str()),
        ])
        .unwrap_or(fallback)
        .to_string()
    }
}

fn first_non_empty<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>) -> Option<&'a str> {
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
}

/// Failure at the upload control. No session is opened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    /// Rejected before transfer.
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    /// The transfer failed; carries the upload message.
    #[error("{0}")]
    Transfer(String),
}

/// Failure recorded on a workflow step. Recoverable via retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    /// Upload step failed.
    #[error("upload failed: {0}")]
    Upload(String),
    /// The backend rejected the file; carries its reason.
    #[error("check failed: {0}")]
    CheckFailed(String),
    /// Ranking update failed.
    #[error("update failed: {0}")]
    Update(String),
    /// Snapshot processing failed.
    #[error("process failed: {0}")]
    Process(String),
}
