//! `Backend` over the ranking service's HTTP API.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use futures::StreamExt;
use rankctl_core::{Backend, Board, CheckReport, ErrorPayload, Part, RankingUpdate, ServiceError, UploadSource};
use reqwest::{Body, Response, Url};
use tokio::sync::mpsc;

pub struct HttpBackend {
    client: reqwest::Client,
    base: Url,
    chunk_bytes: usize,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration, chunk_bytes: usize) -> anyhow::Result<Self> {
        let base = Url::parse(base_url).with_context(|| format!("parse base url {base_url}"))?;
        // A whole-request timeout would cut long ranking updates; bound each read instead.
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            base,
            chunk_bytes: chunk_bytes.max(1),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ServiceError::transport(format!("base url cannot carry a path: {}", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn upload_file(&self, file: &UploadSource, progress: mpsc::UnboundedSender<f64>) -> Result<(), ServiceError> {
        let url = self.endpoint(&["upload", &file.file_name])?;
        let total = file.contents.len();
        let chunks: Vec<Vec<u8>> = file.contents.chunks(self.chunk_bytes).map(<[u8]>::to_vec).collect();

        let reporter = progress.clone();
        let mut sent = 0usize;
        let stream = futures::stream::iter(chunks).map(move |chunk| {
            sent += chunk.len();
            let _ = reporter.send(sent as f64 / total as f64);
            Ok::<_, std::io::Error>(chunk)
        });

        tracing::debug!(url = %url, bytes = total, "PUT upload");
        let resp = self
            .client
            .put(url)
            .body(Body::wrap_stream(stream))
            .send()
            .await
            .map_err(transport)?;
        ensure_success(resp).await?;
        let _ = progress.send(1.0);
        Ok(())
    }

    async fn check_file(&self, board: Board, part: Part, issue: u32) -> Result<CheckReport, ServiceError> {
        let mut url = self.endpoint(&["check"])?;
        url.query_pairs_mut()
            .append_pair("board", board.token())
            .append_pair("part", part.token())
            .append_pair("issue", &issue.to_string());

        tracing::debug!(url = %url, "GET check");
        let resp = self.client.get(url).send().await.map_err(transport)?;
        ensure_success(resp).await?.json::<CheckReport>().await.map_err(transport)
    }

    async fn update_ranking(
        &self,
        request: &RankingUpdate,
        progress: mpsc::UnboundedSender<String>,
    ) -> Result<(), ServiceError> {
        let url = self.endpoint(&["update", "ranking"])?;
        tracing::debug!(url = %url, "POST ranking update");
        let resp = self.client.post(url).json(request).send().await.map_err(transport)?;
        let mut resp = ensure_success(resp).await?;

        let mut lines = LineBuffer::default();
        while let Some(chunk) = resp.chunk().await.map_err(transport)? {
            for line in lines.push(&chunk) {
                let _ = progress.send(line);
            }
        }
        if let Some(line) = lines.finish() {
            let _ = progress.send(line);
        }
        Ok(())
    }

    async fn update_snapshot(&self, date: &str) -> Result<(), ServiceError> {
        let mut url = self.endpoint(&["update", "snapshot"])?;
        url.query_pairs_mut().append_pair("date", date);

        tracing::debug!(url = %url, "POST snapshot update");
        let resp = self.client.post(url).send().await.map_err(transport)?;
        ensure_success(resp).await?;
        Ok(())
    }
}

fn transport(e: reqwest::Error) -> ServiceError {
    ServiceError::transport(e.to_string())
}

async fn ensure_success(resp: Response) -> Result<Response, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(error_from_body(status.as_u16(), &body))
}

/// Non-2xx response to `ServiceError`, keeping `{detail, message}` when the body has them.
fn error_from_body(status: u16, body: &str) -> ServiceError {
    let transport = format!("HTTP {status}");
    match serde_json::from_str::<ErrorPayload>(body) {
        Ok(payload) => ServiceError::with_payload(Some(status), payload, transport),
        Err(_) => ServiceError {
            status: Some(status),
            payload: None,
            transport,
        },
    }
}

/// Splits a byte stream into `\n`-terminated lines.
#[derive(Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(line) = decode(&raw) {
                lines.push(line);
            }
        }
        lines
    }

    /// Trailing text without a final newline.
    fn finish(&mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.pending);
        decode(&raw)
    }
}

fn decode(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let line = text.trim();
    (!line.is_empty()).then(|| line.to_string())
}
