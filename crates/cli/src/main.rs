#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! rankctl: upload ranking and snapshot files and drive their processing steps.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rankctl_core::{classify, CloseOutcome, Orchestrator, RunOutcome, Session, UploadSource, WorkflowOptions};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod http;
mod render;
mod run;

use config::Config;
use http::HttpBackend;
use run::Policy;

#[derive(Parser, Debug)]
#[command(name = "rankctl")]
struct Cli {
    /// Log level (env-filter syntax).
    #[arg(long, global = true, default_value = "info")]
    log: String,

    /// Config file.
    #[arg(long, global = true, default_value = ".rankctl/rankctl.toml")]
    config: PathBuf,

    /// Ranking service base URL, e.g. http://127.0.0.1:8000. Overrides the config file.
    #[arg(long, global = true, env = "RANKCTL_BASE_URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Show what a file name classifies as, without sending anything.
    Classify {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Upload a file, then run its steps.
    Upload { file: PathBuf },
    /// Run the steps of a file that is already on the server.
    Resume { file: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&cli.log))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match &cli.command {
        Command::Init { force } => init(&cli.config, *force),
        Command::Classify { file, json } => classify_file(file, *json),
        Command::Upload { file } => {
            let (cfg, orch) = open(&cli)?;
            let session = upload(&orch, &cfg, file).await?;
            finish(&orch, &cfg, session).await
        }
        Command::Resume { file } => {
            let (cfg, orch) = open(&cli)?;
            let identity = classify(&file_name(file)?)?;
            let session = orch.on_upload_complete(identity);
            finish(&orch, &cfg, session).await
        }
    }
}

fn init(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    Config::default().save_to(path)?;
    println!("wrote {}", path.display());
    Ok(())
}

fn classify_file(file: &Path, json: bool) -> anyhow::Result<()> {
    let identity = classify(&file_name(file)?)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&identity)?);
    } else {
        println!("{}", render::identity(&identity));
    }
    Ok(())
}

fn open(cli: &Cli) -> anyhow::Result<(Config, Orchestrator)> {
    let mut cfg = Config::load_or_default(&cli.config)?;
    if let Some(base_url) = &cli.base_url {
        cfg.backend.base_url = base_url.clone();
    }
    tracing::info!(base_url = %cfg.backend.base_url, "using ranking service");

    let backend = HttpBackend::new(&cfg.backend.base_url, cfg.timeout(), cfg.backend.upload_chunk_bytes)?;
    let orch = Orchestrator::new(
        Arc::new(backend),
        WorkflowOptions {
            force_update: cfg.workflow.force_update,
        },
    );
    Ok((cfg, orch))
}

async fn upload(orch: &Orchestrator, cfg: &Config, file: &Path) -> anyhow::Result<Session> {
    let source = UploadSource {
        file_name: file_name(file)?,
        contents: tokio::fs::read(file)
            .await
            .with_context(|| format!("read {}", file.display()))?,
    };
    // Surface a bad name before touching the network or retrying.
    classify(&source.file_name)?;

    let policy = Policy::from(&cfg.workflow);
    let mut attempt = 1;
    loop {
        let (tx, rx) = mpsc::unbounded_channel();
        let printer = tokio::spawn(run::print_upload_progress(rx));
        let result = orch.upload(&source, tx).await;
        let _ = printer.await;

        match result {
            Ok(session) => return Ok(session),
            Err(e) if attempt < policy.max_attempts => {
                attempt += 1;
                let delay = (policy.backoff)(attempt);
                tracing::warn!(file = %source.file_name, attempt, error = %e, "upload failed; retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e).with_context(|| format!("upload {}", source.file_name)),
        }
    }
}

async fn finish(orch: &Orchestrator, cfg: &Config, session: Session) -> anyhow::Result<()> {
    println!("session {} opened", session.id);
    let outcome = run::drive(&session.workflow, Policy::from(&cfg.workflow)).await;

    println!("{}", render::dialog(&session.workflow.view()));
    match orch.close() {
        CloseOutcome::Cleared => println!("session {} done", session.id),
        CloseOutcome::Hidden => println!("session {} not finished", session.id),
        CloseOutcome::NoSession => {}
    }

    if let Some(failure) = session.workflow.failure() {
        return Err(failure).with_context(|| format!("session {}", session.id));
    }
    match outcome {
        RunOutcome::Failed(message) => bail!("{message}"),
        RunOutcome::Superseded => bail!("session {} was superseded", session.id),
        RunOutcome::Succeeded | RunOutcome::Skipped => Ok(()),
    }
}

fn file_name(path: &Path) -> anyhow::Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .with_context(|| format!("not a file name: {}", path.display()))
}
