//! Isolated execution context - runs one compiled template in a fresh V8
//! isolate.
//!
//! Reachable from template code:
//! - the capability globals of one document kind, plus `h` and `Fragment`
//! - `data` (deep-frozen copy of the bound facade)
//! - `console` (accepts and discards everything)
//! - ECMAScript built-ins
//!
//! Not reachable: `Deno`, ops, timers, `fetch`, the filesystem, the network.
//! Every import resolves to an inert in-memory module.
//!
//! A context is used exactly once: [`ExecutionContext::evaluate`] runs the
//! module and yields its entry point, [`ExecutionContext::invoke`] consumes
//! the context. Both are bounded by one wall-clock deadline, enforced by a
//! watchdog thread that terminates the isolate.

use crate::binder::DataFacade;
use crate::capabilities::CapabilitySet;
use crate::compiler::{CompiledProgram, TEMPLATE_SPECIFIER};
use crate::entry::{self, EntryPoint};
use crate::loader::InertLoader;
use crate::ops::{template_sandbox, SandboxSeed};
use crate::tree::{self, Node};
use crate::RenderError;
use deno_core::{
    error::JsError, v8, JsRuntime, ModuleSpecifier, PollEventLoopOptions, RuntimeOptions,
};
use std::future::Future;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::time::Instant;

/// Configuration for the template sandbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxConfig {
    /// Maximum wall-clock time for one render in milliseconds (default: 1000ms)
    pub timeout_ms: u64,
    /// Maximum heap size in bytes (default: 64MB, None = unlimited)
    pub max_heap_size: Option<usize>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 1_000,
            max_heap_size: Some(64 * 1024 * 1024),
        }
    }
}

impl SandboxConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// ============================================================================
// Watchdog
// ============================================================================

/// Terminates the isolate when the deadline passes. Disarmed on drop.
struct Watchdog {
    cancel: Option<mpsc::Sender<()>>,
    fired: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Watchdog {
    fn arm(handle: v8::IsolateHandle, timeout: Duration) -> Result<Self, RenderError> {
        let (cancel, cancelled) = mpsc::channel::<()>();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();

        let thread = thread::Builder::new()
            .name("docsandbox-watchdog".into())
            .spawn(move || {
                if let Err(mpsc::RecvTimeoutError::Timeout) = cancelled.recv_timeout(timeout) {
                    flag.store(true, Ordering::SeqCst);
                    handle.terminate_execution();
                }
            })
            .map_err(|e| RenderError::internal(format!("failed to start watchdog: {e}")))?;

        Ok(Self {
            cancel: Some(cancel),
            fired,
            thread: Some(thread),
        })
    }

    fn fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        // Dropping the sender wakes the thread with `Disconnected`.
        self.cancel.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

// ============================================================================
// Execution Context
// ============================================================================

pub struct ExecutionContext {
    watchdog: Watchdog,
    runtime: JsRuntime,
    render_fn: v8::Global<v8::Function>,
    program: Option<CompiledProgram>,
    heap_exceeded: Arc<AtomicBool>,
    deadline: Instant,
    timeout: Duration,
    max_heap_size: Option<usize>,
}

impl ExecutionContext {
    /// Builds an isolate for `capabilities`, installs `data` and arms the
    /// wall-clock limit.
    pub fn new(
        program: CompiledProgram,
        capabilities: &'static CapabilitySet,
        data: &DataFacade,
        config: &SandboxConfig,
    ) -> Result<Self, RenderError> {
        let template = ModuleSpecifier::parse(TEMPLATE_SPECIFIER)
            .map_err(|e| RenderError::internal(format!("invalid template specifier: {e}")))?;
        let loader = InertLoader::new(template, capabilities)
            .map_err(|e| RenderError::internal(e.to_string()))?;
        let seed = SandboxSeed::new(capabilities, data.to_value()?);

        // Configure V8 heap limits if specified
        let create_params = config
            .max_heap_size
            .map(|max_bytes| v8::Isolate::create_params().heap_limits(0, max_bytes));

        let mut runtime = JsRuntime::new(RuntimeOptions {
            module_loader: Some(Rc::new(loader)),
            extensions: vec![template_sandbox::init_ops_and_esm(seed)],
            create_params,
            ..Default::default()
        });

        let heap_exceeded = Arc::new(AtomicBool::new(false));
        if config.max_heap_size.is_some() {
            let flag = heap_exceeded.clone();
            let handle = runtime.v8_isolate().thread_safe_handle();
            runtime.add_near_heap_limit_callback(move |current, initial| {
                tracing::warn!(
                    current_mb = current / (1024 * 1024),
                    initial_mb = initial / (1024 * 1024),
                    "template near heap limit, terminating"
                );
                flag.store(true, Ordering::SeqCst);
                handle.terminate_execution();
                // Headroom so V8 can unwind instead of aborting the process.
                current * 2
            });
        }

        let render_fn = take_render_fn(&mut runtime)?;

        let timeout = config.timeout();
        let watchdog = Watchdog::arm(runtime.v8_isolate().thread_safe_handle(), timeout)?;

        Ok(Self {
            watchdog,
            runtime,
            render_fn,
            program: Some(program),
            heap_exceeded,
            deadline: Instant::now() + timeout,
            timeout,
            max_heap_size: config.max_heap_size,
        })
    }

    /// Loads and evaluates the template module and returns its entry point.
    pub async fn evaluate(&mut self) -> Result<EntryPoint, RenderError> {
        let program = self
            .program
            .take()
            .ok_or_else(|| RenderError::internal("template was already evaluated"))?;
        let specifier = ModuleSpecifier::parse(TEMPLATE_SPECIFIER)
            .map_err(|e| RenderError::internal(format!("invalid template specifier: {e}")))?;

        let load = self
            .runtime
            .load_main_es_module_from_code(&specifier, program.into_code());
        let module_id = match bounded(self.deadline, load).await {
            Some(Ok(id)) => id,
            Some(Err(e)) => return Err(self.classify(e)),
            None => return Err(self.timed_out()),
        };

        let evaluation = self.runtime.mod_evaluate(module_id);
        let event_loop = self
            .runtime
            .run_event_loop(PollEventLoopOptions::default());
        match bounded(self.deadline, event_loop).await {
            Some(Ok(())) => {}
            Some(Err(e)) => return Err(self.classify(e)),
            None => return Err(self.timed_out()),
        }
        match bounded(self.deadline, evaluation).await {
            Some(Ok(())) => {}
            Some(Err(e)) => return Err(self.classify(e)),
            None => return Err(self.timed_out()),
        }

        let namespace = self
            .runtime
            .get_module_namespace(module_id)
            .map_err(|e| self.classify(e))?;
        tracing::debug!("template module evaluated");
        entry::extract(&mut self.runtime, &namespace)
    }

    /// Calls the entry point as a document component with empty props and
    /// returns the normalized primitive tree. Consumes the context.
    pub async fn invoke(mut self, entry: EntryPoint) -> Result<Vec<Node>, RenderError> {
        let heap_limit = self.max_heap_size;
        let pending = {
            let scope = &mut self.runtime.handle_scope();
            let render = v8::Local::new(scope, &self.render_fn);
            let entry = v8::Local::new(scope, &entry.0);
            let tc = &mut v8::TryCatch::new(scope);
            let receiver: v8::Local<v8::Value> = v8::undefined(tc).into();

            match render.call(tc, receiver, &[entry.into()]) {
                Some(value) => v8::Global::new(tc, value),
                None => {
                    let terminated = tc.has_terminated();
                    let message = tc
                        .exception()
                        .filter(|_| !terminated)
                        .map(|exception| exception.to_rust_string_lossy(tc));
                    return Err(match message {
                        Some(message) => RenderError::runtime(strip_uncaught(&message)),
                        None => terminal_error(
                            self.watchdog.fired(),
                            self.heap_exceeded.load(Ordering::SeqCst),
                            self.timeout,
                            heap_limit,
                        ),
                    });
                }
            }
        };

        let event_loop = self
            .runtime
            .run_event_loop(PollEventLoopOptions::default());
        match bounded(self.deadline, event_loop).await {
            Some(Ok(())) => {}
            Some(Err(e)) => return Err(self.classify(e)),
            None => return Err(self.timed_out()),
        }

        let value = {
            let scope = &mut self.runtime.handle_scope();
            let local = v8::Local::new(scope, &pending);
            let promise = v8::Local::<v8::Promise>::try_from(local)
                .map_err(|_| RenderError::internal("render did not return a promise"))?;

            match promise.state() {
                v8::PromiseState::Fulfilled => {
                    let result = promise.result(scope);
                    deno_core::serde_v8::from_v8::<serde_json::Value>(scope, result).map_err(
                        |e| RenderError::internal(format!("failed to read document tree: {e}")),
                    )?
                }
                v8::PromiseState::Rejected => {
                    let exception = promise.result(scope);
                    let message = JsError::from_v8_exception(scope, exception).exception_message;
                    return Err(RenderError::runtime(strip_uncaught(&message)));
                }
                v8::PromiseState::Pending => {
                    return Err(RenderError::runtime(
                        "the document function returned a promise that never settled",
                    ));
                }
            }
        };

        if self.watchdog.fired() {
            return Err(self.timed_out());
        }

        tree::from_value(value)
            .map_err(|e| RenderError::internal(format!("malformed document tree: {e}")))
    }

    fn timed_out(&self) -> RenderError {
        tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "template timed out");
        RenderError::Timeout(self.timeout)
    }

    fn classify(&self, err: anyhow::Error) -> RenderError {
        let fired = self.watchdog.fired();
        let heap = self.heap_exceeded.load(Ordering::SeqCst);
        if fired || heap {
            if fired {
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "template timed out");
            }
            return terminal_error(fired, heap, self.timeout, self.max_heap_size);
        }
        let message = match err.downcast_ref::<JsError>() {
            Some(js) => js.exception_message.clone(),
            None => err.to_string(),
        };
        RenderError::runtime(strip_uncaught(&message))
    }
}

/// Error for an isolate that was terminated by one of the limits.
fn terminal_error(
    timed_out: bool,
    heap_exceeded: bool,
    timeout: Duration,
    heap_limit: Option<usize>,
) -> RenderError {
    if heap_exceeded && !timed_out {
        let limit = heap_limit.unwrap_or_default() / (1024 * 1024);
        RenderError::runtime(format!("template exceeded the memory limit of {limit} MiB"))
    } else {
        RenderError::Timeout(timeout)
    }
}

fn strip_uncaught(message: &str) -> String {
    message
        .strip_prefix("Uncaught (in promise) ")
        .or_else(|| message.strip_prefix("Uncaught "))
        .unwrap_or(message)
        .to_string()
}

/// Awaits `fut` until `deadline`; `None` when the deadline passed first.
async fn bounded<F: Future>(deadline: Instant, fut: F) -> Option<F::Output> {
    tokio::time::timeout_at(deadline, fut).await.ok()
}

/// Takes the render function the bootstrap left on the global object and
/// removes it so template code can't reach it.
fn take_render_fn(runtime: &mut JsRuntime) -> Result<v8::Global<v8::Function>, RenderError> {
    let value = runtime
        .execute_script(
            "<sandbox>",
            "(() => { const f = globalThis.__docsandbox_render__; delete globalThis.__docsandbox_render__; return f; })()",
        )
        .map_err(|e| RenderError::internal(format!("sandbox bootstrap failed: {e}")))?;

    let scope = &mut runtime.handle_scope();
    let local = v8::Local::new(scope, value);
    let function = v8::Local::<v8::Function>::try_from(local)
        .map_err(|_| RenderError::internal("sandbox bootstrap did not install a renderer"))?;
    Ok(v8::Global::new(scope, function))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let config = SandboxConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(1000));
        assert_eq!(config.max_heap_size, Some(64 * 1024 * 1024));
    }

    #[test]
    fn test_strip_uncaught() {
        assert_eq!(strip_uncaught("Uncaught TypeError: x"), "TypeError: x");
        assert_eq!(strip_uncaught("Uncaught (in promise) Error: y"), "Error: y");
        assert_eq!(strip_uncaught("Error: z"), "Error: z");
    }

    #[test]
    fn test_terminal_error_prefers_timeout() {
        let timeout = Duration::from_millis(50);
        assert_eq!(
            terminal_error(true, true, timeout, Some(8 << 20)),
            RenderError::Timeout(timeout)
        );
        assert_eq!(
            terminal_error(false, true, timeout, Some(8 << 20)),
            RenderError::runtime("template exceeded the memory limit of 8 MiB")
        );
    }

    #[test]
    fn test_watchdog_fires_after_timeout() {
        let mut runtime = JsRuntime::new(RuntimeOptions::default());
        let watchdog = Watchdog::arm(
            runtime.v8_isolate().thread_safe_handle(),
            Duration::from_millis(10),
        )
        .unwrap();
        thread::sleep(Duration::from_millis(100));
        assert!(watchdog.fired());
    }

    #[test]
    fn test_watchdog_disarms_on_drop() {
        let mut runtime = JsRuntime::new(RuntimeOptions::default());
        let watchdog = Watchdog::arm(
            runtime.v8_isolate().thread_safe_handle(),
            Duration::from_secs(60),
        )
        .unwrap();
        let fired = watchdog.fired.clone();
        drop(watchdog);
        assert!(!fired.load(Ordering::SeqCst));
    }
}
