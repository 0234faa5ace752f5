//! LLM types for requests and streaming responses

use interlude_core::{ToolCall, Turn, DEFAULT_MODEL};
use serde::{Deserialize, Serialize};

/// LLM request. Messages are ledger turns; each binding maps them to its own wire shape.
#[derive(Clone, Debug, Serialize)]
pub struct LlmRequest {
    pub model: String,
    pub messages: Vec<Turn>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<LlmTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

impl Default for LlmRequest {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            messages: Vec::new(),
            tools: Vec::new(),
            max_tokens: Some(8192),
            temperature: None,
            system: None,
        }
    }
}

/// Tool definition
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LlmTool {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Streaming delta from LLM
#[derive(Clone, Debug, PartialEq)]
pub enum StreamDelta {
    Text(String),
    Thinking(String),
    ToolCallStart { id: String, name: String },
    ToolCallDelta { id: String, arguments: String },
    ToolCallEnd { id: String },
    Done { stop_reason: Option<String>, usage: Option<Usage> },
    Error(String),
}

/// Token usage
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Accumulated tool call from streaming
#[derive(Clone, Debug, Default)]
pub struct AccumulatedToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl AccumulatedToolCall {
    pub fn parse_arguments(&self) -> Result<serde_json::Value, serde_json::Error> {
        if self.arguments.trim().is_empty() {
            return Ok(serde_json::Value::Object(Default::default()));
        }
        serde_json::from_str(&self.arguments)
    }

    /// Malformed argument JSON becomes an empty argument map; the tool
    /// reports the missing fields back to the model.
    pub fn into_tool_call(self) -> ToolCall {
        let arguments = match self.parse_arguments() {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(tool = %self.name, "unparseable tool arguments: {}", e);
                serde_json::Value::Null
            }
        };
        ToolCall::from_value(self.id, self.name, arguments)
    }
}
