//! Anthropic Claude API provider with SSE streaming

use crate::provider::{with_cancel, LlmError, LlmProvider, LlmResult, LlmStream};
use crate::types::{LlmRequest, StreamDelta, Usage};
use eventsource_stream::Eventsource;
use futures::StreamExt;
use interlude_core::{Role, Turn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn models(&self) -> &[&str] {
        &[
            "claude-sonnet-4",
            "claude-opus-4",
            "claude-haiku-4-5",
            "claude-3-5",
        ]
    }

    async fn complete_stream(
        &self,
        request: LlmRequest,
        cancel: Option<CancellationToken>,
    ) -> LlmResult<LlmStream> {
        let body = AnthropicRequest {
            model: request.model.clone(),
            messages: encode_messages(&request.messages),
            max_tokens: request.max_tokens.unwrap_or(8192),
            stream: true,
            system: request.system.clone(),
            temperature: request.temperature,
            tools: (!request.tools.is_empty()).then(|| {
                request
                    .tools
                    .iter()
                    .map(|t| AnthropicTool {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        input_schema: t.input_schema.clone(),
                    })
                    .collect()
            }),
        };

        debug!("Anthropic request: model={} messages={}", body.model, body.messages.len());

        let send = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send();

        let response = match &cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => return Err(LlmError::Cancelled),
                r = send => r?,
            },
            None => send.await?,
        };

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Anthropic error {}: {}", status, error_text);

            return Err(match status.as_u16() {
                401 => LlmError::AuthFailed(error_text),
                429 => LlmError::RateLimited {
                    retry_after_ms: 60000,
                },
                _ => LlmError::RequestFailed(format!("{}: {}", status, error_text)),
            });
        }

        let stream: LlmStream = Box::pin(parse_sse_stream(response.bytes_stream()));
        Ok(with_cancel(stream, cancel))
    }
}

/// Map ledger turns onto Anthropic messages. Consecutive tool results are
/// folded into a single user message, which the API requires.
pub fn encode_messages(turns: &[Turn]) -> Vec<AnthropicMessage> {
    let mut messages: Vec<AnthropicMessage> = Vec::new();
    for turn in turns {
        match turn.role {
            Role::User => messages.push(AnthropicMessage {
                role: "user".into(),
                content: AnthropicContent::Text(turn.content.clone()),
            }),
            Role::Agent if turn.tool_calls.is_empty() => messages.push(AnthropicMessage {
                role: "assistant".into(),
                content: AnthropicContent::Text(turn.content.clone()),
            }),
            Role::Agent => {
                let mut blocks = Vec::new();
                if !turn.content.is_empty() {
                    blocks.push(ContentBlock::Text {
                        text: turn.content.clone(),
                    });
                }
                blocks.extend(turn.tool_calls.iter().map(|tc| ContentBlock::ToolUse {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    input: tc.arguments_value(),
                }));
                messages.push(AnthropicMessage {
                    role: "assistant".into(),
                    content: AnthropicContent::Blocks(blocks),
                });
            }
            Role::ToolResult => {
                let block = ContentBlock::ToolResult {
                    tool_use_id: turn.tool_call_id.clone().unwrap_or_default(),
                    content: turn.content.clone(),
                };
                let folded = match messages.last_mut() {
                    Some(AnthropicMessage {
                        role,
                        content: AnthropicContent::Blocks(blocks),
                    }) if role.as_str() == "user"
                        && blocks
                            .iter()
                            .any(|b| matches!(b, ContentBlock::ToolResult { .. })) =>
                    {
                        blocks.push(block.clone());
                        true
                    }
                    _ => false,
                };
                if !folded {
                    messages.push(AnthropicMessage {
                        role: "user".into(),
                        content: AnthropicContent::Blocks(vec![block]),
                    });
                }
            }
        }
    }
    messages
}

/// Decode an Anthropic SSE byte stream into deltas.
pub fn parse_sse_stream<E>(
    bytes_stream: impl futures::Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
) -> impl futures::Stream<Item = LlmResult<StreamDelta>> + Send
where
    E: std::error::Error + Send + 'static,
{
    async_stream::stream! {
        let mut current_tool_id: Option<String> = None;
        let mut stop_reason: Option<String> = None;
        let mut usage: Option<Usage> = None;

        let events = bytes_stream.eventsource();
        tokio::pin!(events);

        while let Some(event) = events.next().await {
            let event = match event {
                Ok(e) => e,
                Err(e) => {
                    yield Err(LlmError::StreamError(e.to_string()));
                    continue;
                }
            };

            if event.data.is_empty() { continue; }

            match event.event.as_str() {
                "content_block_start" => {
                    if let Ok(data) = serde_json::from_str::<ContentBlockStart>(&event.data) {
                        if let ContentBlockType::ToolUse { id, name } = data.content_block {
                            current_tool_id = Some(id.clone());
                            yield Ok(StreamDelta::ToolCallStart { id, name });
                        }
                    }
                }
                "content_block_delta" => {
                    if let Ok(data) = serde_json::from_str::<ContentBlockDelta>(&event.data) {
                        match data.delta {
                            DeltaType::TextDelta { text } => {
                                yield Ok(StreamDelta::Text(text));
                            }
                            DeltaType::ThinkingDelta { thinking } => {
                                yield Ok(StreamDelta::Thinking(thinking));
                            }
                            DeltaType::InputJsonDelta { partial_json } => {
                                if let Some(id) = &current_tool_id {
                                    yield Ok(StreamDelta::ToolCallDelta {
                                        id: id.clone(),
                                        arguments: partial_json,
                                    });
                                }
                            }
                            DeltaType::Other => {}
                        }
                    }
                }
                "content_block_stop" => {
                    if let Some(id) = current_tool_id.take() {
                        yield Ok(StreamDelta::ToolCallEnd { id });
                    }
                }
                "message_delta" => {
                    if let Ok(data) = serde_json::from_str::<MessageDelta>(&event.data) {
                        if let Some(sr) = data.delta.stop_reason {
                            debug!("Message complete: stop_reason={}", sr);
                            stop_reason = Some(sr);
                        }
                        if data.usage.is_some() {
                            usage = data.usage;
                        }
                    }
                }
                "message_stop" => {
                    yield Ok(StreamDelta::Done {
                        stop_reason: stop_reason.take().or_else(|| Some("end_turn".to_string())),
                        usage: usage.take(),
                    });
                }
                "error" => {
                    if let Ok(data) = serde_json::from_str::<ErrorEvent>(&event.data) {
                        yield Err(LlmError::StreamError(data.error.message));
                    }
                }
                _ => {}
            }
        }
    }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicTool>>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AnthropicMessage {
    pub role: String,
    pub content: AnthropicContent,
}

/// Message content - plain string or array of blocks
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum AnthropicContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// Content block types
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    #[serde(rename = "tool_result")]
    ToolResult { tool_use_id: String, content: String },
}

#[derive(Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Deserialize)]
struct ContentBlockStart {
    content_block: ContentBlockType,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ContentBlockType {
    #[serde(rename = "tool_use")]
    ToolUse { id: String, name: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct ContentBlockDelta {
    delta: DeltaType,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum DeltaType {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(rename = "thinking_delta")]
    ThinkingDelta { thinking: String },
    #[serde(rename = "input_json_delta")]
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct MessageDelta {
    delta: MessageDeltaContent,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct MessageDeltaContent {
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEvent {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}
