//! Console client for a ComfyUI backend.
//!
//! Connects a session, optionally uploads an image and queues a workflow,
//! then prints every state change until the job finishes or Ctrl-C.
//!
//! ```bash
//! # Resume the identity saved in the profile file
//! cargo run -p console-example
//!
//! # Connect as a given identity and queue a workflow
//! cargo run -p console-example -- --identity alice --workflow flow.json
//!
//! # Register a new account folder first
//! cargo run -p console-example -- --identity bob --accounts ./users --register
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result, bail};
use clap::Parser;
use comfy_commands::AssetKind;
use comfy_core::{ClientConfig, ConnectionPhase};
use comfy_session::{
    DirAccounts, FileIdentityStore, MemoryAccounts, ResumeOutcome, Session, SessionSnapshot,
};
use tokio_stream::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "comfy-console")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Backend origin [env: COMFY_BASE_URL, default: http://127.0.0.1:3000]
    #[arg(long)]
    base_url: Option<String>,

    /// Path prefix of the backend API [env: COMFY_API_PREFIX, default: /api-comfy]
    #[arg(long)]
    api_prefix: Option<String>,

    /// Identity to connect as. Defaults to the saved profile.
    #[arg(short, long)]
    identity: Option<String>,

    /// Root folder holding one folder per account
    #[arg(long, value_name = "DIR")]
    accounts: Option<PathBuf>,

    /// Create the account before connecting
    #[arg(long, requires = "identity")]
    register: bool,

    /// Image to upload as an input asset
    #[arg(long, value_name = "FILE")]
    upload: Option<PathBuf>,

    /// Workflow graph (JSON) to queue
    #[arg(short, long, value_name = "FILE")]
    workflow: Option<PathBuf>,

    /// Print host statistics and exit
    #[arg(long)]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let mut config = ClientConfig::from_env();
    if let Some(base_url) = &args.base_url {
        config.base_url.clone_from(base_url);
    }
    if let Some(prefix) = &args.api_prefix {
        config = config.with_api_prefix(prefix);
    }
    let origin = config.base_url.clone();
    let identities = Arc::new(FileIdentityStore::default_location()?);
    tracing::info!("Profile at {}", identities.path().display());

    let session = Session::websocket(config, identities);
    connect(&session, &args).await?;

    if session.phase() != ConnectionPhase::Open {
        bail!("could not connect to {origin}");
    }

    if args.stats {
        let stats = session.system_stats().await?;
        println!("{}", serde_json::to_string_pretty(&stats)?);
        session.disconnect();
        return Ok(());
    }

    if let Some(path) = &args.upload {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .context("upload path has no file name")?;
        let asset = session
            .upload_asset(name, bytes, AssetKind::Input, false)
            .await?;
        println!("uploaded {} -> {}", asset.name, session.commands().asset_url(&asset));
    }

    if let Some(path) = &args.workflow {
        let raw = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let workflow: serde_json::Value = serde_json::from_slice(&raw)?;
        let queued = session.submit_job(&workflow, None).await?;
        if queued.has_node_errors() {
            bail!("workflow rejected: {}", queued.node_errors);
        }
        println!("queued {} at position {}", queued.prompt_id, queued.number);
    }

    let mut updates = session.snapshot_stream();
    let mut was_running = false;
    loop {
        tokio::select! {
            snapshot = updates.next() => {
                let Some(snapshot) = snapshot else { break };
                print_snapshot(&snapshot);
                if snapshot.phase == ConnectionPhase::Closed {
                    break;
                }
                let running = snapshot.execution.is_running();
                if was_running && !running && args.workflow.is_some() {
                    break;
                }
                was_running = running;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    session.disconnect();
    Ok(())
}

async fn connect(session: &Session, args: &Args) -> Result<()> {
    let accounts: Box<dyn comfy_core::AccountDirectory> = match &args.accounts {
        Some(root) => Box::new(DirAccounts::new(root)),
        None => Box::new(MemoryAccounts::new()),
    };

    match &args.identity {
        Some(identity) if args.register => {
            session.register(accounts.as_ref(), identity).await?;
        }
        Some(identity) => session.connect(identity).await,
        None if args.accounts.is_some() => match session.resume(accounts.as_ref()).await? {
            ResumeOutcome::NoIdentity => bail!("no saved identity, pass --identity"),
            ResumeOutcome::Expired(name) => bail!("account {name} no longer exists"),
            ResumeOutcome::Resumed(name) => tracing::info!("Resumed as {name}"),
        },
        None => {
            let identity = session
                .identity()
                .context("no saved identity, pass --identity")?;
            session.connect(&identity).await;
        }
    }
    Ok(())
}

fn print_snapshot(snapshot: &SessionSnapshot) {
    let progress = snapshot
        .progress
        .and_then(|p| p.fraction())
        .map_or_else(|| "-".to_string(), |f| format!("{:.0}%", f * 100.0));
    println!(
        "[{:?}] queue={} job={} node={} progress={} preview={}",
        snapshot.phase,
        snapshot.queue.remaining,
        snapshot.execution.current_job_id.as_deref().unwrap_or("-"),
        snapshot.execution.executing_node_id.as_deref().unwrap_or("-"),
        progress,
        snapshot.preview_url.as_deref().unwrap_or("-"),
    );
}
