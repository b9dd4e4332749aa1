#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Upload classification and staged workflows for ranking and snapshot files.

pub mod backend;
pub mod board;
pub mod data;
pub mod error;
pub mod identity;
pub mod orchestrator;
pub mod step;
pub mod view;

pub use backend::{Backend, CheckReport, RankingUpdate, UploadSource};
pub use board::{BoardPhase, BoardState, BoardWorkflow};
pub use data::{DataPhase, DataState, DataWorkflow};
pub use error::{ClassifyError, ErrorPayload, ServiceError, StepError, UploadError};
pub use identity::{classify, Board, BoardIdentity, DataIdentity, Identity, Part};
pub use orchestrator::{CloseOutcome, Orchestrator, Session, SessionId, Workflow, WorkflowOptions};
pub use step::{RunOutcome, StepKind, StepState, StepStatus};
pub use view::{DialogView, StepAction, StepRow};
