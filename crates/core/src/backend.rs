//! Service boundary consumed by the workflows.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ServiceError;
use crate::identity::{Board, BoardIdentity, Part};

/// A file picked by the operator, ready to be sent.
#[derive(Debug, Clone)]
pub struct UploadSource {
    /// Bare file name, used for classification and as the remote name.
    pub file_name: String,
    /// Raw file bytes.
    pub contents: Vec<u8>,
}

/// Response of the check call. An empty `detail` means the file passed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckReport {
    /// Failure reason; empty when the file passed.
    #[serde(default)]
    pub detail: String,
}

impl CheckReport {
    /// Whether the file passed validation.
    pub fn passed(&self) -> bool {
        self.detail.is_empty()
    }
}

/// Arguments of the ranking update call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RankingUpdate {
    /// Board cadence.
    pub board: Board,
    /// Main or new-songs part.
    pub part: Part,
    /// Issue number.
    pub issue: u32,
    /// Overwrite an already published issue.
    pub force: bool,
}

impl RankingUpdate {
    /// Builds the request for an identity.
    pub fn new(identity: &BoardIdentity, force: bool) -> Self {
        Self {
            board: identity.board,
            part: identity.part,
            issue: identity.issue,
            force,
        }
    }
}

/// Backend operations. One call per workflow step attempt.
///
/// Progress is reported on the supplied channel; the returned future settles
/// exactly once. Implementations may ignore send errors on the channel: a
/// closed receiver only means nobody observes this attempt anymore.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Transfers a file, reporting fractions in `0.0..=1.0`.
    async fn upload_file(
        &self,
        file: &UploadSource,
        progress: mpsc::UnboundedSender<f64>,
    ) -> Result<(), ServiceError>;

    /// Validates an uploaded board file.
    async fn check_file(&self, board: Board, part: Part, issue: u32) -> Result<CheckReport, ServiceError>;

    /// Long-running ranking update; streams human-readable progress lines.
    async fn update_ranking(
        &self,
        request: &RankingUpdate,
        progress: mpsc::UnboundedSender<String>,
    ) -> Result<(), ServiceError>;

    /// Processes the daily snapshot for `date` (`yyyy-MM-dd`).
    async fn update_snapshot(&self, date: &str) -> Result<(), ServiceError>;
}
