//! # docsandbox
//!
//! Renders untrusted TSX document templates to HTML email or PDF inside a
//! locked-down deno_core isolate.
//!
//! ## Pipeline
//!
//! `(source, kind, data)` → compile → capabilities + bind → isolate →
//! default export → document renderer → [`RenderResult`].
//!
//! ## Security Guarantees
//!
//! - **No filesystem or network access**: every import resolves to an inert
//!   in-memory module, `fetch` doesn't exist
//! - **No host APIs**: `Deno`, ops, timers and `process` are unreachable
//! - **Per-kind capabilities**: email templates never see PDF primitives and
//!   vice versa
//! - **Read-only data**: `data` is a deep-frozen copy of the caller's object
//! - **Bounded execution**: a wall-clock limit and a heap limit terminate
//!   runaway templates
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docsandbox::{render, DataObject, DocumentKind, RenderRequest, SandboxConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let request = RenderRequest {
//!         source: "export default () => <Html><Text>{data.log?.id}</Text></Html>".into(),
//!         kind: DocumentKind::Email,
//!         data: DataObject::empty(),
//!     };
//!
//!     let result = render(request, &SandboxConfig::default()).await;
//!     println!("{}", serde_json::to_string(&result).unwrap());
//! }
//! ```

mod binder;
mod capabilities;
mod compiler;
mod entry;
mod error;
mod loader;
mod ops;
pub mod protocol;
pub mod render;
mod result;
mod runtime;
mod sanitize;
mod style;
mod tree;

pub use binder::{bind, format_duration, format_size, BindError, DataFacade, DataObject};
pub use capabilities::{capabilities_for, Capability, CapabilitySet, DocumentKind};
pub use compiler::{compile, CompileError, CompiledProgram};
pub use error::RenderError;
pub use render::{renderer_for, DocumentRenderer};
pub use result::{scrub, RenderResult};
pub use runtime::{ExecutionContext, SandboxConfig};
pub use tree::Node;

use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Instant;

/// One render attempt. Consumed by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderRequest {
    /// Template program text (TSX).
    pub source: String,
    pub kind: DocumentKind,
    #[serde(default = "DataObject::empty")]
    pub data: DataObject,
}

/// Runs the whole pipeline on the current thread's (current-thread) tokio
/// runtime. The isolate is created and dropped on this thread.
#[tracing::instrument(skip_all, fields(kind = %request.kind))]
async fn execute(request: RenderRequest, config: &SandboxConfig) -> Result<String, RenderError> {
    let RenderRequest { source, kind, data } = request;

    let program = compile(&source)?;
    let capabilities = capabilities_for(kind);
    let facade = bind(&data)?;
    tracing::debug!(logs = facade.logs.len(), "data bound");

    let mut context = ExecutionContext::new(program, capabilities, &facade, config)?;
    let entry = context.evaluate().await?;
    let tree = context.invoke(entry).await?;
    tracing::debug!(roots = tree.len(), "document tree produced");

    renderer_for(kind).render(&tree)
}

/// Runs one request to completion on a dedicated thread with its own tokio
/// runtime and V8 isolate.
fn run_isolated(request: RenderRequest, config: &SandboxConfig) -> RenderResult {
    let kind = request.kind;
    let started = Instant::now();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => return RenderError::internal(format!("failed to start runtime: {e}")).into(),
    };
    let outcome = runtime.block_on(execute(request, config));

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &outcome {
        Ok(output) => tracing::debug!(%kind, elapsed_ms, bytes = output.len(), "render succeeded"),
        Err(err) => tracing::debug!(%kind, elapsed_ms, class = err.class(), "render failed"),
    }
    outcome.into()
}

fn spawn_render<F>(request: RenderRequest, config: &SandboxConfig, deliver: F) -> Result<(), RenderError>
where
    F: FnOnce(RenderResult) + Send + 'static,
{
    let config = config.clone();
    thread::Builder::new()
        .name("docsandbox-render".into())
        .spawn(move || deliver(run_isolated(request, &config)))
        .map(drop)
        .map_err(|e| RenderError::internal(format!("failed to spawn render thread: {e}")))
}

/// Renders `request`, blocking the calling thread until it finishes.
pub fn render_blocking(request: RenderRequest, config: &SandboxConfig) -> RenderResult {
    let (tx, rx) = std::sync::mpsc::channel();
    if let Err(err) = spawn_render(request, config, move |result| {
        let _ = tx.send(result);
    }) {
        return err.into();
    }
    rx.recv()
        .unwrap_or_else(|_| RenderError::internal("render thread panicked").into())
}

/// Renders `request` without blocking the caller's executor.
///
/// Requests are independent: concurrent calls each get their own thread and
/// isolate. A caller that no longer wants a result simply drops the future.
pub async fn render(request: RenderRequest, config: &SandboxConfig) -> RenderResult {
    let (tx, rx) = tokio::sync::oneshot::channel();
    if let Err(err) = spawn_render(request, config, move |result| {
        let _ = tx.send(result);
    }) {
        return err.into();
    }
    rx.await
        .unwrap_or_else(|_| RenderError::internal("render thread panicked").into())
}
