//! Scripted in-memory backend shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rankctl_core::{Backend, Board, CheckReport, ErrorPayload, Part, RankingUpdate, ServiceError, UploadSource};
use tokio::sync::{mpsc, oneshot};

/// What the fake does, in order, before answering.
pub enum Event {
    Progress(String),
    Hold(oneshot::Receiver<()>),
}

pub struct Reply<T> {
    pub events: Vec<Event>,
    pub result: Result<T, ServiceError>,
}

impl<T> Reply<T> {
    pub fn ok(value: T) -> Self {
        Self { events: vec![], result: Ok(value) }
    }

    pub fn err(error: ServiceError) -> Self {
        Self { events: vec![], result: Err(error) }
    }

    /// Same reply, but only after the returned sender fires.
    pub fn held(mut self) -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        self.events.push(Event::Hold(rx));
        (self, tx)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Upload(String),
    Check(Board, Part, u32),
    Update(RankingUpdate),
    Snapshot(String),
}

#[derive(Default)]
struct Script {
    uploads: VecDeque<Reply<()>>,
    checks: VecDeque<Reply<CheckReport>>,
    updates: VecDeque<Reply<()>>,
    snapshots: VecDeque<Reply<()>>,
    calls: Vec<Call>,
}

/// Answers each call with the next scripted reply, or success when none is queued.
#[derive(Default)]
pub struct ScriptedBackend {
    script: Mutex<Script>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_upload(&self, reply: Reply<()>) {
        self.script.lock().unwrap().uploads.push_back(reply);
    }

    pub fn push_check(&self, reply: Reply<CheckReport>) {
        self.script.lock().unwrap().checks.push_back(reply);
    }

    pub fn push_update(&self, reply: Reply<()>) {
        self.script.lock().unwrap().updates.push_back(reply);
    }

    pub fn push_snapshot(&self, reply: Reply<()>) {
        self.script.lock().unwrap().snapshots.push_back(reply);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().unwrap().calls.clone()
    }

    fn record(&self, call: Call) {
        self.script.lock().unwrap().calls.push(call);
    }
}

async fn play<T>(reply: Reply<T>, progress: Option<&mpsc::UnboundedSender<String>>) -> Result<T, ServiceError> {
    for event in reply.events {
        match event {
            Event::Progress(line) => {
                if let Some(tx) = progress {
                    let _ = tx.send(line);
                }
            }
            Event::Hold(rx) => {
                let _ = rx.await;
            }
        }
    }
    reply.result
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn upload_file(&self, file: &UploadSource, progress: mpsc::UnboundedSender<f64>) -> Result<(), ServiceError> {
        self.record(Call::Upload(file.file_name.clone()));
        let reply = self.script.lock().unwrap().uploads.pop_front();
        let _ = progress.send(0.5);
        let result = match reply {
            Some(reply) => play(reply, None).await,
            None => Ok(()),
        };
        if result.is_ok() {
            let _ = progress.send(1.0);
        }
        result
    }

    async fn check_file(&self, board: Board, part: Part, issue: u32) -> Result<CheckReport, ServiceError> {
        self.record(Call::Check(board, part, issue));
        let reply = self.script.lock().unwrap().checks.pop_front();
        match reply {
            Some(reply) => play(reply, None).await,
            None => Ok(CheckReport::default()),
        }
    }

    async fn update_ranking(&self, request: &RankingUpdate, progress: mpsc::UnboundedSender<String>) -> Result<(), ServiceError> {
        self.record(Call::Update(request.clone()));
        let reply = self.script.lock().unwrap().updates.pop_front();
        match reply {
            Some(reply) => play(reply, Some(&progress)).await,
            None => Ok(()),
        }
    }

    async fn update_snapshot(&self, date: &str) -> Result<(), ServiceError> {
        self.record(Call::Snapshot(date.to_string()));
        let reply = self.script.lock().unwrap().snapshots.pop_front();
        match reply {
            Some(reply) => play(reply, None).await,
            None => Ok(()),
        }
    }
}

pub fn payload_error(message: &str) -> ServiceError {
    ServiceError::with_payload(
        Some(500),
        ErrorPayload {
            detail: None,
            message: Some(message.to_string()),
        },
        "HTTP 500",
    )
}

pub fn source(name: &str) -> UploadSource {
    UploadSource {
        file_name: name.to_string(),
        contents: b"rank,title\n1,example\n".to_vec(),
    }
}
