//! ScriptedProvider - deterministic LLM responses for tests and offline demos
//!
//! Each call to `complete_stream` pops the next `Script`. When the sequence
//! is exhausted the fallback script is used.

use crate::provider::{with_cancel, LlmProvider, LlmResult, LlmStream};
use crate::types::{LlmRequest, StreamDelta};
use async_stream::stream;
use interlude_core::Role;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// One scripted reply
#[derive(Clone, Debug)]
pub enum Script {
    /// Text-only response, streamed in small chunks
    Text(String),
    /// A single tool call
    ToolCall { name: String, args: Value },
    /// A single tool call with a caller-chosen id
    ToolCallWithId { id: String, name: String, args: Value },
    /// Several tool calls in one turn
    MultiToolCall(Vec<(String, Value)>),
    /// Text followed by a tool call
    TextThenTool {
        text: String,
        tool_name: String,
        tool_args: Value,
    },
    /// Stream-level error after the request was accepted
    StreamError(String),
    /// Request rejected before streaming
    Fail(String),
    /// Never produces output; only cancellation ends it
    Hang,
    /// Echo the last ledger turn back as text
    Echo,
}

impl Script {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn tool(name: impl Into<String>, args: Value) -> Self {
        Self::ToolCall {
            name: name.into(),
            args,
        }
    }
}

pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    fallback: Script,
    requests: Mutex<Vec<LlmRequest>>,
    call_count: AtomicUsize,
    chunk_chars: usize,
}

impl ScriptedProvider {
    /// Always reply with the same script
    pub fn constant(script: Script) -> Self {
        Self::build(Vec::new(), script)
    }

    /// Consume scripts in order
    pub fn sequence(scripts: Vec<Script>) -> Self {
        Self::build(
            scripts,
            Script::Text("(scripted: sequence exhausted)".into()),
        )
    }

    /// Offline demo mode: repeat the last turn back.
    pub fn echo() -> Self {
        Self::constant(Script::Echo)
    }

    fn build(scripts: Vec<Script>, fallback: Script) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            fallback,
            requests: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
            chunk_chars: 8,
        }
    }

    pub fn with_chunk_chars(mut self, n: usize) -> Self {
        self.chunk_chars = n.max(1);
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn next_script(&self) -> Script {
        let n = self.call_count.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("scripted provider call #{}", n + 1);
        self.scripts
            .lock()
            .ok()
            .and_then(|mut s| s.pop_front())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

fn call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4().simple())
}

fn chunk(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

fn tool_deltas(id: String, name: String, args: &Value) -> Vec<StreamDelta> {
    vec![
        StreamDelta::ToolCallStart {
            id: id.clone(),
            name,
        },
        StreamDelta::ToolCallDelta {
            id: id.clone(),
            arguments: args.to_string(),
        },
        StreamDelta::ToolCallEnd { id },
    ]
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn models(&self) -> &[&str] {
        &["scripted"]
    }

    fn supports_model(&self, _model: &str) -> bool {
        true
    }

    async fn complete_stream(
        &self,
        request: LlmRequest,
        cancel: Option<CancellationToken>,
    ) -> LlmResult<LlmStream> {
        let script = self.next_script();
        let last = request.messages.last().cloned();
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        let mut deltas: Vec<StreamDelta> = Vec::new();
        match script {
            Script::Text(text) => {
                deltas.extend(chunk(&text, self.chunk_chars).into_iter().map(StreamDelta::Text));
            }
            Script::ToolCall { name, args } => deltas.extend(tool_deltas(call_id(), name, &args)),
            Script::ToolCallWithId { id, name, args } => {
                deltas.extend(tool_deltas(id, name, &args))
            }
            Script::MultiToolCall(calls) => {
                for (name, args) in calls {
                    deltas.extend(tool_deltas(call_id(), name, &args));
                }
            }
            Script::TextThenTool {
                text,
                tool_name,
                tool_args,
            } => {
                deltas.extend(chunk(&text, self.chunk_chars).into_iter().map(StreamDelta::Text));
                deltas.extend(tool_deltas(call_id(), tool_name, &tool_args));
            }
            Script::StreamError(message) => deltas.push(StreamDelta::Error(message)),
            Script::Fail(message) => return Err(crate::LlmError::RequestFailed(message)),
            Script::Hang => {
                let pending: LlmStream = Box::pin(futures::stream::pending());
                return Ok(with_cancel(pending, cancel));
            }
            Script::Echo => {
                let reply = match last {
                    Some(turn) if turn.role == Role::ToolResult => {
                        format!("Tool said: {}", turn.content)
                    }
                    Some(turn) => format!("You said: {}", turn.content),
                    None => "Nothing to echo.".to_string(),
                };
                deltas.extend(chunk(&reply, self.chunk_chars).into_iter().map(StreamDelta::Text));
            }
        }
        deltas.push(StreamDelta::Done {
            stop_reason: Some("end_turn".into()),
            usage: None,
        });

        let stream: LlmStream = Box::pin(stream! {
            for delta in deltas {
                yield Ok(delta);
            }
        });
        Ok(with_cancel(stream, cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_respects_char_boundaries() {
        let parts = chunk("héllo wörld", 4);
        assert_eq!(parts.concat(), "héllo wörld");
        assert!(parts.iter().all(|p| p.chars().count() <= 4));
    }
}
