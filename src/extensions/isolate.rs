//! Deno isolate wrapper for extension execution.
//!
//! Each extension runs in its own V8 isolate on its own thread. The thread
//! owns the `JsRuntime` (which is `!Send`) and serves commands sent by the
//! [`ExtensionIsolate`] handle. A fresh isolate is created for every load;
//! globals, module cache and pending promises of one extension are never
//! visible to another.
//!
//! Errors thrown while the entry script runs synchronously are returned to
//! the caller of [`ExtensionIsolate::load`]. Anything that fails after that,
//! such as a rejected promise nobody awaited, is logged and reported to the
//! user as a generic notification; it never reaches the registry.

use std::future::Future;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use deno_core::{v8, JsRuntime, PollEventLoopOptions, RuntimeOptions};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, warn};

use super::error::{ExtensionError, ExtensionResult};
use super::kit::{castkit_kit, KitContext, BOOTSTRAP_JS};
use super::notify::{runtime_error_event, HostNotifier};
use super::source::FormValues;
use super::ExtensionId;

/// State of an extension isolate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IsolateState {
    /// Runtime created, entry script not run yet.
    Loading,
    /// Entry script ran; source callbacks can be invoked.
    Ready,
    /// Execution was terminated or the isolate thread is gone.
    Failed { message: String },
}

/// Which source callback to invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormCall {
    PreForm,
    PostForm,
}

impl FormCall {
    fn as_str(self) -> &'static str {
        match self {
            FormCall::PreForm => "preForm",
            FormCall::PostForm => "postForm",
        }
    }
}

enum IsolateCommand {
    /// Run the entry script. `reply` fires once the synchronous part is done,
    /// `settled` once the event loop has drained.
    Load {
        reply: oneshot::Sender<ExtensionResult<()>>,
        settled: oneshot::Sender<()>,
    },
    /// Invoke a source callback and return its JSON result.
    Form {
        call: FormCall,
        slot: u32,
        input: Option<FormValues>,
        reply: oneshot::Sender<ExtensionResult<Value>>,
    },
}

/// Handle to an extension isolate running on its own thread.
pub struct ExtensionIsolate {
    /// Extension identifier.
    pub id: ExtensionId,

    /// Current state.
    state: IsolateState,

    commands: Option<mpsc::UnboundedSender<IsolateCommand>>,

    /// Lets the host stop runaway JavaScript from another thread.
    terminator: v8::IsolateHandle,

    thread: Option<thread::JoinHandle<()>>,
}

impl ExtensionIsolate {
    /// Start a new isolate bound to `ctx`.
    ///
    /// The bootstrap script has already run when this returns; the entry
    /// script has not.
    pub async fn spawn(ctx: KitContext, notifier: Arc<dyn HostNotifier>) -> ExtensionResult<Self> {
        let id = ctx.extension.id.clone();
        let (commands, rx) = mpsc::unbounded_channel();
        let (started_tx, started_rx) = oneshot::channel();

        let thread = thread::Builder::new()
            .name(format!("ext-{id}"))
            .spawn(move || isolate_main(ctx, notifier, rx, started_tx))?;

        let terminator = match started_rx.await {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(ExtensionError::IsolateUnavailable(id));
            }
        };

        Ok(Self {
            id,
            state: IsolateState::Loading,
            commands: Some(commands),
            terminator,
            thread: Some(thread),
        })
    }

    pub fn state(&self) -> &IsolateState {
        &self.state
    }

    /// Run the entry script, then wait for its pending work to settle.
    ///
    /// Only failures of the synchronous run are returned. A timeout while
    /// settling terminates the isolate and is reported as a runtime error.
    /// One deadline covers both phases.
    pub async fn load(
        &mut self,
        entry: &str,
        timeout: Option<Duration>,
        notifier: &dyn HostNotifier,
    ) -> ExtensionResult<()> {
        let (reply, reply_rx) = oneshot::channel();
        let (settled, settled_rx) = oneshot::channel();
        self.send(IsolateCommand::Load { reply, settled })?;

        let deadline = timeout.map(|limit| (Instant::now() + limit, limit));
        let id = self.id.clone();
        let executed = self
            .until(deadline, async move {
                reply_rx
                    .await
                    .map_err(|_| ExtensionError::IsolateUnavailable(id))?
            })
            .await;
        if let Err(e) = executed {
            if !matches!(self.state, IsolateState::Failed { .. }) {
                self.state = IsolateState::Failed {
                    message: e.to_string(),
                };
            }
            return Err(e);
        }
        self.state = IsolateState::Ready;

        let settling = self
            .until(deadline, async move {
                let _ = settled_rx.await;
                Ok(())
            })
            .await;
        if let Err(e) = settling {
            error!(extension = %self.id, error = %e, "Extension did not settle after load");
            notifier.emit(runtime_error_event());
        }

        debug!(extension = %self.id, entry, "Entry script executed");
        Ok(())
    }

    /// Invoke a source callback stored in `slot`.
    pub async fn call(
        &mut self,
        call: FormCall,
        slot: u32,
        input: Option<FormValues>,
        timeout: Option<Duration>,
    ) -> ExtensionResult<Value> {
        if let IsolateState::Failed { .. } = self.state {
            return Err(ExtensionError::IsolateUnavailable(self.id.clone()));
        }

        let (reply, reply_rx) = oneshot::channel();
        self.send(IsolateCommand::Form {
            call,
            slot,
            input,
            reply,
        })?;

        let deadline = timeout.map(|limit| (Instant::now() + limit, limit));
        let id = self.id.clone();
        self.until(deadline, async move {
            reply_rx
                .await
                .map_err(|_| ExtensionError::IsolateUnavailable(id))?
        })
        .await
    }

    fn send(&mut self, command: IsolateCommand) -> ExtensionResult<()> {
        let sent = self
            .commands
            .as_ref()
            .map(|tx| tx.send(command).is_ok())
            .unwrap_or(false);
        if sent {
            Ok(())
        } else {
            self.state = IsolateState::Failed {
                message: "isolate thread exited".to_string(),
            };
            Err(ExtensionError::IsolateUnavailable(self.id.clone()))
        }
    }

    /// Run `work` until `deadline`, terminating the isolate if it passes.
    ///
    /// The deadline carries the configured limit for error reporting.
    async fn until<T>(
        &mut self,
        deadline: Option<(Instant, Duration)>,
        work: impl Future<Output = ExtensionResult<T>>,
    ) -> ExtensionResult<T> {
        let Some((deadline, limit)) = deadline else {
            return work.await;
        };
        match tokio::time::timeout_at(deadline, work).await {
            Ok(result) => result,
            Err(_) => {
                warn!(extension = %self.id, ?limit, "Terminating unresponsive extension");
                self.terminate(format!("timed out after {limit:?}"));
                Err(ExtensionError::ExecutionTimeout(limit))
            }
        }
    }

    fn terminate(&mut self, message: String) {
        self.terminator.terminate_execution();
        self.commands = None;
        self.state = IsolateState::Failed { message };
    }
}

impl Drop for ExtensionIsolate {
    fn drop(&mut self) {
        self.commands = None;
        self.terminator.terminate_execution();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!(extension = %self.id, "Isolate thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for ExtensionIsolate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionIsolate")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Isolate thread
// ─────────────────────────────────────────────────────────────────────────────

fn isolate_main(
    ctx: KitContext,
    notifier: Arc<dyn HostNotifier>,
    rx: mpsc::UnboundedReceiver<IsolateCommand>,
    started: oneshot::Sender<ExtensionResult<v8::IsolateHandle>>,
) {
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            let _ = started.send(Err(e.into()));
            return;
        }
    };

    let mut worker = match IsolateWorker::new(ctx, notifier) {
        Ok(worker) => worker,
        Err(e) => {
            let _ = started.send(Err(e));
            return;
        }
    };

    if started.send(Ok(worker.terminator())).is_err() {
        return;
    }
    rt.block_on(worker.serve(rx));
}

struct IsolateWorker {
    id: ExtensionId,
    entry: String,
    runtime: JsRuntime,
    notifier: Arc<dyn HostNotifier>,
}

impl IsolateWorker {
    fn new(ctx: KitContext, notifier: Arc<dyn HostNotifier>) -> ExtensionResult<Self> {
        let id = ctx.extension.id.clone();
        let entry = ctx.extension.entry_file.clone();

        let mut runtime = JsRuntime::new(RuntimeOptions {
            extensions: vec![castkit_kit::init_ops()],
            ..Default::default()
        });
        runtime.op_state().borrow_mut().put(ctx);

        runtime
            .execute_script("ext:castkit/bootstrap.js", BOOTSTRAP_JS.to_string())
            .map_err(|e| ExtensionError::Execution {
                extension: id.clone(),
                message: format!("bootstrap failed: {e}"),
            })?;

        Ok(Self {
            id,
            entry,
            runtime,
            notifier,
        })
    }

    fn terminator(&mut self) -> v8::IsolateHandle {
        self.runtime.v8_isolate().thread_safe_handle()
    }

    async fn serve(mut self, mut rx: mpsc::UnboundedReceiver<IsolateCommand>) {
        while let Some(command) = rx.recv().await {
            match command {
                IsolateCommand::Load { reply, settled } => {
                    let result = self.execute_entry();
                    let executed = result.is_ok();
                    let _ = reply.send(result);
                    if executed {
                        self.settle(&settled).await;
                    }
                    let _ = settled.send(());
                }
                IsolateCommand::Form {
                    call,
                    slot,
                    input,
                    reply,
                } => {
                    let result = self.dispatch(call, slot, input.as_ref()).await;
                    let _ = reply.send(result);
                }
            }

            if self.runtime.v8_isolate().is_execution_terminating() {
                break;
            }
        }
        debug!(extension = %self.id, "Isolate shut down");
    }

    fn execute_entry(&mut self) -> ExtensionResult<()> {
        let script = format!("globalThis.__castkitMain({});", serde_json::to_string(&self.entry)?);
        self.runtime
            .execute_script("<entry>", script)
            .map(|_| ())
            .map_err(|e| ExtensionError::Execution {
                extension: self.id.clone(),
                message: e.to_string(),
            })
    }

    /// Drive the event loop until nothing is pending, reporting late failures.
    ///
    /// Once the host stops waiting it has already reported the failure.
    async fn settle(&mut self, settled: &oneshot::Sender<()>) {
        if let Err(e) = self
            .runtime
            .run_event_loop(PollEventLoopOptions::default())
            .await
        {
            if settled.is_closed() || self.runtime.v8_isolate().is_execution_terminating() {
                debug!(extension = %self.id, error = %e, "Settle interrupted by termination");
                return;
            }
            error!(extension = %self.id, error = %e, "Uncaught error in extension");
            self.notifier.emit(runtime_error_event());
        }
    }

    async fn dispatch(
        &mut self,
        call: FormCall,
        slot: u32,
        input: Option<&FormValues>,
    ) -> ExtensionResult<Value> {
        let input = match input {
            Some(values) => serde_json::to_string(values)?,
            None => "null".to_string(),
        };
        let script = format!(
            "globalThis.__castkitDispatch({}, {slot}, {input});",
            serde_json::to_string(call.as_str())?
        );

        let runtime_error = |e: &dyn std::fmt::Display| ExtensionError::Runtime {
            extension: self.id.clone(),
            message: e.to_string(),
        };

        let promise = self
            .runtime
            .execute_script("<dispatch>", script)
            .map_err(|e| runtime_error(&e))?;
        let resolve = self.runtime.resolve(promise);
        let value = self
            .runtime
            .with_event_loop_promise(resolve, PollEventLoopOptions::default())
            .await
            .map_err(|e| runtime_error(&e))?;

        let json = {
            let scope = &mut self.runtime.handle_scope();
            let local = v8::Local::new(scope, value);
            local
                .to_string(scope)
                .map(|s| s.to_rust_string_lossy(scope))
                .unwrap_or_else(|| "null".to_string())
        };

        Ok(serde_json::from_str(&json)?)
    }
}
