//! Event multiplexer - merges token fragments and step signals into one
//! ordered, numbered event stream per run
//!
//! Producers share a single bounded channel through two typed handles:
//! `TokenSink` for streamed fragments and `StepSink` for state-machine
//! progress. One channel means arrival order is emission order. The
//! consumer side is a `Multiplexer` that
//!
//! - stamps every event with a gap-free `seq`, starting at 1 with `start`
//! - forwards only chatbot-labelled text as `content`
//! - announces a tool decision once per agent turn, whichever path reports it first
//! - closes the stream with exactly one terminal event (`end` or `error`)

use futures::Stream;
use interlude_core::{EndStatus, Event, NodeLabel, ThreadId, ToolCall, Turn};
use serde_json::Value;
use std::collections::HashSet;
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_util::sync::DropGuard;
use tracing::{debug, warn};

/// The outbound event stream of one run.
pub type EventStream = Pin<Box<dyn Stream<Item = Event> + Send>>;

/// A partial output unit from the token-level path.
#[derive(Clone, Debug)]
pub struct Fragment {
    pub node: NodeLabel,
    /// Ledger index the producing turn will occupy.
    pub turn_index: usize,
    pub text: String,
}

/// Step-level progress from the state machine.
#[derive(Clone, Debug)]
pub enum StepSignal {
    AgentTurn {
        turn_index: usize,
        /// Calls the reasoner asked for before truncation.
        requested: usize,
        turn: Turn,
    },
    ToolRunning {
        call: ToolCall,
    },
    ToolResult {
        call: ToolCall,
        content: String,
        is_error: bool,
    },
    Suspended {
        thread_id: ThreadId,
        call: ToolCall,
        payload: Value,
    },
    Finished,
    Failed {
        code: String,
        message: String,
    },
}

#[derive(Clone, Debug)]
pub enum Signal {
    Token(Fragment),
    Step(StepSignal),
}

/// Producer handle for token fragments.
#[derive(Clone)]
pub struct TokenSink {
    tx: mpsc::Sender<Signal>,
}

impl TokenSink {
    /// Returns false once the consumer is gone.
    pub async fn send(&self, fragment: Fragment) -> bool {
        self.tx.send(Signal::Token(fragment)).await.is_ok()
    }

    pub async fn text(&self, node: NodeLabel, turn_index: usize, text: impl Into<String>) -> bool {
        self.send(Fragment {
            node,
            turn_index,
            text: text.into(),
        })
        .await
    }
}

/// Producer handle for step signals.
#[derive(Clone)]
pub struct StepSink {
    tx: mpsc::Sender<Signal>,
}

impl StepSink {
    /// Returns false once the consumer is gone.
    pub async fn send(&self, signal: StepSignal) -> bool {
        self.tx.send(Signal::Step(signal)).await.is_ok()
    }
}

/// Create the shared channel behind a run's sinks.
pub fn channel(capacity: usize) -> (TokenSink, StepSink, mpsc::Receiver<Signal>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (TokenSink { tx: tx.clone() }, StepSink { tx }, rx)
}

/// Drain `rx` through a fresh `Multiplexer`. `guard` lives as long as the
/// stream, so a consumer that stops listening cancels the run.
pub fn event_stream(rx: mpsc::Receiver<Signal>, guard: Option<DropGuard>) -> EventStream {
    Box::pin(async_stream::stream! {
        let _guard = guard;
        let mut rx = rx;
        let mut mux = Multiplexer::new();
        yield mux.start();
        while let Some(signal) = rx.recv().await {
            for event in mux.accept(signal) {
                yield event;
            }
            if mux.is_terminated() {
                break;
            }
        }
        if let Some(event) = mux.close() {
            yield event;
        }
    })
}

#[derive(Debug, Default)]
pub struct Multiplexer {
    seq: u64,
    chunks: u64,
    accumulated: usize,
    announced: HashSet<usize>,
    last_node: Option<NodeLabel>,
    terminated: bool,
}

impl Multiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn start(&mut self) -> Event {
        self.stamp(Event::start())
    }

    /// Translate one signal into zero or more numbered events.
    pub fn accept(&mut self, signal: Signal) -> Vec<Event> {
        if self.terminated {
            debug!("dropping signal after terminal event");
            return Vec::new();
        }
        let events = match signal {
            Signal::Token(fragment) => self.fragment(fragment),
            Signal::Step(step) => self.step(step),
        };
        events.into_iter().map(|e| self.stamp(e)).collect()
    }

    /// Called when the producers hang up. Emits an `error` if the run never
    /// reached a terminal event.
    pub fn close(&mut self) -> Option<Event> {
        if self.terminated {
            return None;
        }
        warn!("run ended without a terminal event");
        self.terminated = true;
        let event = Event::error("internal", "run ended unexpectedly");
        Some(self.stamp(event))
    }

    fn stamp(&mut self, mut event: Event) -> Event {
        self.seq += 1;
        event.seq = self.seq;
        event
    }

    fn fragment(&mut self, fragment: Fragment) -> Vec<Event> {
        if fragment.node != NodeLabel::Chatbot {
            debug!(node = fragment.node.as_str(), "filtered non-chatbot fragment");
            return Vec::new();
        }
        if fragment.text.is_empty() {
            return Vec::new();
        }
        self.chunks += 1;
        self.accumulated += fragment.text.chars().count();
        self.last_node = Some(NodeLabel::Chatbot);
        vec![Event::content(fragment.text, self.chunks, self.accumulated)]
    }

    fn step(&mut self, step: StepSignal) -> Vec<Event> {
        match step {
            StepSignal::AgentTurn {
                turn_index,
                requested,
                turn,
            } => {
                self.last_node = Some(NodeLabel::Chatbot);
                match turn.tool_calls.first() {
                    Some(call) => self.announce(turn_index, requested, call),
                    None => Vec::new(),
                }
            }
            StepSignal::ToolRunning { call } => {
                self.last_node = Some(NodeLabel::Tools);
                vec![Event::tool_running(&call)]
            }
            StepSignal::ToolResult {
                call,
                content,
                is_error,
            } => {
                self.last_node = Some(NodeLabel::Tools);
                vec![Event::tool_result(&call, content, is_error)]
            }
            StepSignal::Suspended {
                thread_id,
                call,
                payload,
            } => {
                self.terminated = true;
                self.last_node = Some(NodeLabel::Tools);
                vec![
                    Event::intervention_required(&thread_id, &call, &payload),
                    self.end(EndStatus::Suspended),
                ]
            }
            StepSignal::Finished => {
                self.terminated = true;
                vec![self.end(EndStatus::Completed)]
            }
            StepSignal::Failed { code, message } => {
                self.terminated = true;
                vec![Event::error(&code, message)]
            }
        }
    }

    fn announce(&mut self, turn_index: usize, requested: usize, call: &ToolCall) -> Vec<Event> {
        if !self.announced.insert(turn_index) {
            return Vec::new();
        }
        vec![
            Event::ai_decision(turn_index, requested, 1),
            Event::tool_call(call),
        ]
    }

    fn end(&self, status: EndStatus) -> Event {
        Event::end(status, self.chunks, self.accumulated, self.last_node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interlude_core::{Arguments, EventKind};

    fn call() -> ToolCall {
        ToolCall::new("c1", "lookup", Arguments::new())
    }

    fn text(node: NodeLabel, s: &str) -> Signal {
        Signal::Token(Fragment {
            node,
            turn_index: 1,
            text: s.into(),
        })
    }

    #[test]
    fn tool_fragments_are_filtered() {
        let mut mux = Multiplexer::new();
        mux.start();
        assert!(mux.accept(text(NodeLabel::Tools, "raw output")).is_empty());
        let events = mux.accept(text(NodeLabel::Chatbot, "hi"));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].seq, 2);
        assert_eq!(events[0].get("chunk_number"), Some(&Value::from(1)));
    }

    #[test]
    fn decision_announced_once_per_turn() {
        let mut mux = Multiplexer::new();
        let decided = || {
            Signal::Step(StepSignal::AgentTurn {
                turn_index: 1,
                requested: 2,
                turn: Turn::agent_with_calls("", vec![call()]),
            })
        };
        let first = mux.accept(decided());
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].kind, EventKind::AiDecision);
        assert_eq!(first[1].kind, EventKind::ToolCall);
        assert!(mux.accept(decided()).is_empty());
    }

    #[test]
    fn nothing_after_terminal() {
        let mut mux = Multiplexer::new();
        mux.start();
        let end = mux.accept(Signal::Step(StepSignal::Finished));
        assert_eq!(end[0].kind, EventKind::End);
        assert!(mux.accept(text(NodeLabel::Chatbot, "late")).is_empty());
        assert!(mux.close().is_none());
    }

    #[test]
    fn close_without_terminal_reports_error() {
        let mut mux = Multiplexer::new();
        mux.start();
        let event = mux.close().unwrap();
        assert_eq!(event.kind, EventKind::Error);
        assert_eq!(event.seq, 2);
    }
}
