//! Executor - the interruptible reason → route → act loop
//!
//! ```text
//!   submit ──▶ REASONING ──▶ ROUTING ──┬─ no call ───────────▶ DONE
//!                  ▲                   ├─ suspending call ──▶ SUSPENDED
//!                  │                   └─ other call ──▶ ACTING
//!                  └───────────────────────────────────────────┘
//!   resume ──▶ (resolve pending call) ──▶ REASONING
//! ```
//!
//! Every step boundary writes a checkpoint. A run owns its thread's lease
//! for its whole life, and its events leave through one `EventStream`.

use crate::lease::{ThreadLease, ThreadLeases};
use crate::multiplexer::{self, EventStream, StepSignal, StepSink, TokenSink};
use crate::reasoner::Reasoner;
use crate::router::{self, Route};
use crate::store::{CheckpointStore, MemoryCheckpointStore};
use interlude_core::{
    Error, ExecutorConfig, NodeLabel, PendingInterrupt, Result, ThreadId, ThreadState,
    ThreadStatus, ToolCall, Turn,
};
use interlude_llm::LlmProvider;
use interlude_tools::{ToolOutcome, ToolRegistry};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct Executor {
    reasoner: Arc<Reasoner>,
    tools: Arc<ToolRegistry>,
    store: Arc<dyn CheckpointStore>,
    leases: ThreadLeases,
    config: Arc<ExecutorConfig>,
}

impl Executor {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: ToolRegistry,
        store: Arc<dyn CheckpointStore>,
        config: ExecutorConfig,
    ) -> Self {
        let reasoner = Reasoner::new(provider, &config, tools.get_definitions());
        Self {
            reasoner: Arc::new(reasoner),
            tools: Arc::new(tools),
            store,
            leases: ThreadLeases::new(),
            config: Arc::new(config),
        }
    }

    pub fn with_memory_store(
        provider: Arc<dyn LlmProvider>,
        tools: ToolRegistry,
        config: ExecutorConfig,
    ) -> Self {
        Self::new(provider, tools, Arc::new(MemoryCheckpointStore::new()), config)
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn provider_name(&self) -> &str {
        self.reasoner.provider_name()
    }

    /// Whether a run currently holds the thread.
    pub fn is_running(&self, thread_id: &ThreadId) -> bool {
        self.leases.is_held(thread_id)
    }

    pub async fn thread(&self, thread_id: &ThreadId) -> Result<ThreadState> {
        self.store.load(thread_id).await
    }

    /// Append a user turn and run until done, suspended or failed.
    ///
    /// Fails before streaming with `ThreadBusy` if another run holds the
    /// thread, or `ThreadSuspended` if it is waiting for human input.
    pub async fn submit(&self, thread_id: ThreadId, text: impl Into<String>) -> Result<EventStream> {
        let lease = self.leases.acquire(&thread_id)?;
        let mut state = self.store.load(&thread_id).await?;
        match state.status {
            ThreadStatus::Suspended => {
                return Err(Error::ThreadSuspended(thread_id.to_string()));
            }
            ThreadStatus::Running => {
                warn!(thread = %thread_id, "stored state says running but no run holds the thread; treating as idle");
                state.status = ThreadStatus::Idle;
            }
            ThreadStatus::Idle => {}
        }
        let text = text.into();
        info!(thread = %thread_id, chars = text.len(), "submit");
        Ok(self.launch(lease, state, Entry::Submit(Turn::user(text))))
    }

    /// Answer the thread's pending interrupt and continue the run.
    ///
    /// Fails before streaming with `ThreadBusy`, or `NoPendingInterrupt` if
    /// the thread is not suspended.
    pub async fn resume(&self, thread_id: ThreadId, payload: Value) -> Result<EventStream> {
        let lease = self.leases.acquire(&thread_id)?;
        let state = self.store.load(&thread_id).await?;
        if !state.is_suspended() {
            return Err(Error::NoPendingInterrupt(thread_id.to_string()));
        }
        info!(thread = %thread_id, "resume");
        Ok(self.launch(lease, state, Entry::Resume(payload)))
    }

    fn launch(&self, lease: ThreadLease, state: ThreadState, entry: Entry) -> EventStream {
        let cancel = CancellationToken::new();
        let (tokens, steps, rx) = multiplexer::channel(self.config.event_buffer);
        let run = Run {
            lease: Some(lease),
            committed: state.clone(),
            state,
            steps_taken: 0,
            reasoner: self.reasoner.clone(),
            tools: self.tools.clone(),
            store: self.store.clone(),
            config: self.config.clone(),
            tokens,
            steps,
            cancel: cancel.clone(),
        };
        tokio::spawn(run.drive(entry));
        multiplexer::event_stream(rx, Some(cancel.drop_guard()))
    }
}

enum Entry {
    Submit(Turn),
    Resume(Value),
}

enum Exit {
    Completed,
    Suspended { call: ToolCall, payload: Value },
}

/// One in-flight run. Owns the working copy of the thread state.
struct Run {
    lease: Option<ThreadLease>,
    state: ThreadState,
    /// Last state successfully written to the store.
    committed: ThreadState,
    steps_taken: usize,
    reasoner: Arc<Reasoner>,
    tools: Arc<ToolRegistry>,
    store: Arc<dyn CheckpointStore>,
    config: Arc<ExecutorConfig>,
    tokens: TokenSink,
    steps: StepSink,
    cancel: CancellationToken,
}

impl Run {
    async fn drive(mut self, entry: Entry) {
        let thread_id = self.state.thread_id.clone();
        match self.advance(entry).await {
            Ok(Exit::Completed) => {
                self.state.status = ThreadStatus::Idle;
                self.state.pending_interrupt = None;
                if let Err(e) = self.checkpoint().await {
                    return self.fail(e).await;
                }
                info!(thread = %thread_id, steps = self.steps_taken, "run completed");
                self.release();
                self.steps.send(StepSignal::Finished).await;
            }
            Ok(Exit::Suspended { call, payload }) => {
                self.state.status = ThreadStatus::Suspended;
                self.state.pending_interrupt = Some(PendingInterrupt {
                    tool_call: call.clone(),
                    payload: payload.clone(),
                });
                if let Err(e) = self.checkpoint().await {
                    return self.fail(e).await;
                }
                info!(thread = %thread_id, tool = %call.name, "run suspended awaiting human input");
                self.release();
                self.steps
                    .send(StepSignal::Suspended {
                        thread_id,
                        call,
                        payload,
                    })
                    .await;
            }
            Err(Error::Cancelled) => {
                debug!(thread = %thread_id, "run cancelled");
                if self.state.status != ThreadStatus::Suspended {
                    settle_open_call(&mut self.state, "[cancelled]");
                    self.state.status = ThreadStatus::Idle;
                    if let Err(e) = self.checkpoint().await {
                        warn!(thread = %thread_id, "checkpoint after cancel failed: {}", e);
                    }
                }
            }
            Err(e) => self.fail(e).await,
        }
    }

    async fn advance(&mut self, entry: Entry) -> Result<Exit> {
        match entry {
            Entry::Submit(turn) => {
                self.state.ledger.push(turn)?;
                self.state.status = ThreadStatus::Running;
                self.checkpoint().await?;
            }
            Entry::Resume(payload) => self.apply_resume(payload).await?,
        }

        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if self.steps_taken >= self.config.max_steps {
                return Err(Error::StepLimitExceeded {
                    limit: self.config.max_steps,
                });
            }
            self.steps_taken += 1;

            let turn_index = self.state.ledger.len();
            let mut turn = self
                .reasoner
                .generate_streaming(&self.state.ledger, turn_index, &self.tokens, &self.cancel)
                .await?;

            let requested = turn.tool_calls.len();
            router::enforce_single_call(&mut turn);
            self.state.ledger.push(turn.clone())?;
            self.checkpoint().await?;
            let route = router::route(&turn, &self.tools);
            self.steps
                .send(StepSignal::AgentTurn {
                    turn_index,
                    requested,
                    turn,
                })
                .await;

            let call = match route {
                Route::Finish => return Ok(Exit::Completed),
                Route::Suspend(call) => call,
                Route::Act(call) => {
                    self.steps
                        .send(StepSignal::ToolRunning { call: call.clone() })
                        .await;
                    call
                }
            };

            debug!(tool = %call.name, step = self.steps_taken, "executing tool");
            let outcome = self
                .tools
                .invoke(&call.name, call.arguments.clone(), self.cancel.clone())
                .await;
            match outcome {
                Ok(ToolOutcome::Suspend(signal)) => {
                    return Ok(Exit::Suspended {
                        call,
                        payload: signal.payload,
                    });
                }
                Ok(ToolOutcome::Output(output)) => {
                    self.record_tool_result(&call, output, false).await?;
                }
                Err(e) if e.is_recoverable() => {
                    warn!(tool = %call.name, "tool failed: {}", e);
                    self.record_tool_result(&call, e.to_string(), true).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Close the pending call with the tool's resolution of `payload`.
    async fn apply_resume(&mut self, payload: Value) -> Result<()> {
        let pending = self
            .state
            .pending_interrupt
            .take()
            .ok_or_else(|| Error::NoPendingInterrupt(self.state.thread_id.to_string()))?;
        if let Some(note) = payload.get("response").and_then(Value::as_str) {
            info!(thread = %self.state.thread_id, "resume note: {}", note);
        }
        let resolution = self.tools.resolve(&pending.tool_call, &payload)?;
        debug!(
            tool = %pending.tool_call.name,
            updates = resolution.updates.len(),
            "resolved pending call"
        );
        self.state.status = ThreadStatus::Running;
        self.state.fields.extend(resolution.updates);
        self.record_tool_result(&pending.tool_call, resolution.content, false)
            .await
    }

    async fn record_tool_result(&mut self, call: &ToolCall, output: String, is_error: bool) -> Result<()> {
        let content = truncate_output(output, self.config.max_tool_output_chars);
        self.state
            .ledger
            .push(Turn::tool_result(&call.id, content.clone()))?;
        self.checkpoint().await?;
        let turn_index = self.state.ledger.len() - 1;
        self.tokens
            .text(NodeLabel::Tools, turn_index, content.clone())
            .await;
        self.steps
            .send(StepSignal::ToolResult {
                call: call.clone(),
                content,
                is_error,
            })
            .await;
        Ok(())
    }

    async fn checkpoint(&mut self) -> Result<()> {
        self.state.touch();
        self.store
            .save(&self.state.thread_id, self.state.clone())
            .await?;
        self.committed = self.state.clone();
        Ok(())
    }

    /// Restore the last checkpoint and report the failure.
    async fn fail(&mut self, err: Error) {
        let thread_id = self.state.thread_id.clone();
        error!(thread = %thread_id, code = err.code(), "run failed: {}", err);

        let mut restored = self.committed.clone();
        if restored.status != ThreadStatus::Suspended {
            settle_open_call(&mut restored, &format!("[aborted: {}]", err));
            restored.status = ThreadStatus::Idle;
        }
        restored.touch();
        if let Err(e) = self.store.save(&thread_id, restored).await {
            error!(thread = %thread_id, "could not restore checkpoint: {}", e);
        }

        self.release();
        self.steps
            .send(StepSignal::Failed {
                code: err.code().to_string(),
                message: err.to_string(),
            })
            .await;
    }

    /// Free the thread before the terminal event goes out, so a client that
    /// reacts to it immediately is not told the thread is busy.
    fn release(&mut self) {
        self.lease.take();
    }
}

/// Give an unanswered tool call a synthetic result so the ledger stays paired.
fn settle_open_call(state: &mut ThreadState, content: &str) {
    let Some(call) = state.ledger.open_call().cloned() else {
        return;
    };
    if let Err(e) = state.ledger.push(Turn::tool_result(call.id, content)) {
        warn!(thread = %state.thread_id, "could not settle open call: {}", e);
    }
}

/// Cap tool output at `max_chars` characters.
fn truncate_output(output: String, max_chars: usize) -> String {
    let total = output.chars().count();
    if total <= max_chars {
        return output;
    }
    let cut = output
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(output.len());
    format!("{}...\n[truncated, {} total chars]", &output[..cut], total)
}
