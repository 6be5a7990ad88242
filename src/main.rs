//! docsandbox CLI
//!
//! Single-shot mode:
//!   docsandbox render --kind email --template report.tsx --data day.json --out report.html
//!
//! Worker mode (persistent process, JSON lines on stdin/stdout):
//!   docsandbox serve --max-concurrent 4
//!
//! Protocol (worker mode):
//!   Request (stdin):
//!     {"id":1,"source":"export default () => ...","kind":"pdf","data":{...}}
//!
//!   Response (stdout):
//!     {"msgtype":"render","id":1,"success":true,"output":"JVBERi0..."}
//!
//! Logs go to stderr and are filtered with `RUST_LOG`.

use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::{Args, Parser, Subcommand};
use docsandbox::protocol::{parse_request, WorkerMessage};
use docsandbox::{render, DataObject, DocumentKind, RenderRequest, RenderResult, SandboxConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Semaphore};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docsandbox", version, about = "Render sandboxed TSX templates to HTML email or PDF")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render one template and print or write the result
    Render {
        /// Document kind to produce
        #[arg(long, value_enum)]
        kind: DocumentKind,
        /// Template source file (TSX)
        #[arg(long)]
        template: PathBuf,
        /// Data object as JSON; defaults to an empty project
        #[arg(long)]
        data: Option<PathBuf>,
        /// Output file; PDF output is written as raw bytes
        #[arg(long)]
        out: Option<PathBuf>,
        #[command(flatten)]
        limits: Limits,
    },
    /// Serve render requests as JSON lines on stdin/stdout
    Serve {
        /// Renders allowed in flight at once; further requests wait
        #[arg(long, default_value_t = 4)]
        max_concurrent: usize,
        #[command(flatten)]
        limits: Limits,
    },
}

#[derive(Args)]
struct Limits {
    /// Wall-clock limit per render in milliseconds
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,
    /// Heap limit per render in MiB (0 = unlimited)
    #[arg(long, default_value_t = 64)]
    max_heap_mb: usize,
}

impl Limits {
    fn config(&self) -> SandboxConfig {
        SandboxConfig {
            timeout_ms: self.timeout_ms,
            max_heap_size: (self.max_heap_mb > 0).then(|| self.max_heap_mb * 1024 * 1024),
        }
    }
}

/// Run in single-shot mode
async fn run_single_shot(
    kind: DocumentKind,
    template: PathBuf,
    data: Option<PathBuf>,
    out: Option<PathBuf>,
    config: SandboxConfig,
) -> Result<()> {
    let source = tokio::fs::read_to_string(&template)
        .await
        .with_context(|| format!("failed to read template {}", template.display()))?;
    let data = match data {
        Some(path) => {
            let json = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read data {}", path.display()))?;
            serde_json::from_str::<DataObject>(&json)
                .map_err(|e| anyhow!("Invalid data JSON: {}", e))?
        }
        None => DataObject::empty(),
    };

    let request = RenderRequest { source, kind, data };
    let output = match render(request, &config).await {
        RenderResult::Success { output } => output,
        RenderResult::Failure { error } => bail!(error),
    };

    match out {
        Some(path) => {
            let bytes = match kind {
                DocumentKind::Email => output.into_bytes(),
                DocumentKind::Pdf => STANDARD
                    .decode(output)
                    .context("renderer produced invalid base64")?,
            };
            tokio::fs::write(&path, bytes)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "document written");
        }
        None => println!("{output}"),
    }

    Ok(())
}

/// Run in worker mode: every line is an independent request, rendered
/// concurrently; responses are written as they complete.
///
/// At most `max_concurrent` renders (each a thread plus an isolate) are in
/// flight; stdin is not read further until one of them finishes.
async fn run_server(config: SandboxConfig, max_concurrent: usize) -> Result<()> {
    let slots = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let (tx, mut rx) = mpsc::unbounded_channel::<WorkerMessage>();

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(message) = rx.recv().await {
            let mut line = serde_json::to_vec(&message)?;
            line.push(b'\n');
            stdout.write_all(&line).await?;
            stdout.flush().await?;
        }
        anyhow::Ok(())
    });

    tracing::info!(max_concurrent, "worker ready, reading from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match parse_request(&line) {
            Ok(request) => {
                let permit = slots.clone().acquire_owned().await?;
                let tx = tx.clone();
                let config = config.clone();
                tokio::spawn(async move {
                    let result = render(request.request, &config).await;
                    drop(permit);
                    let _ = tx.send(WorkerMessage::render(request.id, result));
                });
            }
            Err(message) => {
                tracing::warn!("rejected malformed request");
                let _ = tx.send(message);
            }
        }
    }

    // stdin closed: let in-flight renders finish, then stop the writer.
    drop(tx);
    writer.await??;
    tracing::info!("worker shutting down");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Render {
            kind,
            template,
            data,
            out,
            limits,
        } => run_single_shot(kind, template, data, out, limits.config()).await,
        Command::Serve {
            max_concurrent,
            limits,
        } => run_server(limits.config(), max_concurrent).await,
    }
}
