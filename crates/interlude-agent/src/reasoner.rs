//! Reasoner - one model call per reasoning step
//!
//! Sends the whole ledger to the provider, forwards text deltas to the token
//! path as they arrive and assembles the finished agent turn.

use crate::multiplexer::TokenSink;
use futures::StreamExt;
use interlude_core::{Error, ExecutorConfig, Ledger, NodeLabel, Result, Turn};
use interlude_llm::{AccumulatedToolCall, LlmProvider, LlmRequest, LlmTool, StreamDelta};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct Reasoner {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
    system_prompt: Option<String>,
    tools: Vec<LlmTool>,
}

impl Reasoner {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &ExecutorConfig, tools: Vec<LlmTool>) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            system_prompt: config.system_prompt.clone(),
            tools,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn request(&self, ledger: &Ledger) -> LlmRequest {
        LlmRequest {
            model: self.model.clone(),
            messages: ledger.turns().to_vec(),
            tools: self.tools.clone(),
            max_tokens: Some(self.max_tokens),
            temperature: None,
            system: self.system_prompt.clone(),
        }
    }

    /// Produce the next agent turn, streaming text to `tokens` under
    /// `turn_index`. Returned calls are as requested; truncation is the
    /// router's job. Calls are announced by the executor once the turn is
    /// in the ledger.
    pub async fn generate_streaming(
        &self,
        ledger: &Ledger,
        turn_index: usize,
        tokens: &TokenSink,
        cancel: &CancellationToken,
    ) -> Result<Turn> {
        self.generate_inner(ledger, turn_index, Some(tokens), cancel)
            .await
    }

    /// Produce the next agent turn without streaming.
    pub async fn generate(&self, ledger: &Ledger, cancel: &CancellationToken) -> Result<Turn> {
        self.generate_inner(ledger, ledger.len(), None, cancel).await
    }

    async fn generate_inner(
        &self,
        ledger: &Ledger,
        turn_index: usize,
        tokens: Option<&TokenSink>,
        cancel: &CancellationToken,
    ) -> Result<Turn> {
        let provider = self.provider.name().to_string();
        let mut stream = self
            .provider
            .complete_stream(self.request(ledger), Some(cancel.clone()))
            .await
            .map_err(|e| e.into_core(&provider))?;

        let mut text = String::new();
        let mut calls: Vec<AccumulatedToolCall> = Vec::new();
        let mut current: Option<AccumulatedToolCall> = None;

        while let Some(delta) = stream.next().await {
            match delta.map_err(|e| e.into_core(&provider))? {
                StreamDelta::Text(t) => {
                    text.push_str(&t);
                    if let Some(sink) = tokens {
                        sink.text(NodeLabel::Chatbot, turn_index, t).await;
                    }
                }
                StreamDelta::Thinking(_) => {}
                StreamDelta::ToolCallStart { id, name } => {
                    if let Some(unfinished) = current.take() {
                        calls.push(unfinished);
                    }
                    current = Some(AccumulatedToolCall {
                        id,
                        name,
                        arguments: String::new(),
                    });
                }
                StreamDelta::ToolCallDelta { arguments, .. } => {
                    if let Some(ref mut tc) = current {
                        tc.arguments.push_str(&arguments);
                    }
                }
                StreamDelta::ToolCallEnd { .. } => {
                    if let Some(tc) = current.take() {
                        calls.push(tc);
                    }
                }
                StreamDelta::Done { stop_reason, usage } => {
                    debug!(provider = %provider, ?stop_reason, ?usage, "reasoning step complete");
                }
                StreamDelta::Error(message) => {
                    return Err(Error::reasoner(&provider, message));
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let Some(tc) = current.take() {
            warn!(tool = %tc.name, "tool call left open by provider stream");
            calls.push(tc);
        }

        let tool_calls: Vec<_> = calls
            .into_iter()
            .map(AccumulatedToolCall::into_tool_call)
            .collect();

        Ok(Turn::agent_with_calls(text, tool_calls))
    }
}
