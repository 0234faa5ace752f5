//! Outbound event model and its wire encoding
//!
//! Wire format, one JSON record per event:
//!
//!   { "type": "content", "content": "Hel", "metadata": { "node": "chatbot", "seq": 3, "chunk_number": 1, ... } }
//!
//! Transports frame records either as NDJSON (one record per line) or as
//! SSE (`data: <record>\n\n`). Events are transient and never persisted.

use crate::types::{ThreadId, ToolCall};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Map, Value};

/// Kind of an outbound event.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Start,
    Content,
    AiDecision,
    ToolCall,
    ToolRunning,
    ToolResult,
    InterventionRequired,
    End,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Content => "content",
            Self::AiDecision => "ai_decision",
            Self::ToolCall => "tool_call",
            Self::ToolRunning => "tool_running",
            Self::ToolResult => "tool_result",
            Self::InterventionRequired => "intervention_required",
            Self::End => "end",
            Self::Error => "error",
        }
    }

    /// `end` and `error` close a run's stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End | Self::Error)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which part of the engine produced an event.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NodeLabel {
    System,
    Chatbot,
    Tools,
}

impl NodeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Chatbot => "chatbot",
            Self::Tools => "tools",
        }
    }
}

/// How a run ended without error.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EndStatus {
    Completed,
    Suspended,
}

/// One outbound event. `seq` is assigned by the multiplexer.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub seq: u64,
    pub kind: EventKind,
    pub node: NodeLabel,
    pub content: String,
    pub metadata: Map<String, Value>,
}

const RESERVED_METADATA: &[&str] = &["node", "seq", "thread_id", "tool_call_id", "payload"];

impl Event {
    pub fn new(kind: EventKind, node: NodeLabel) -> Self {
        Self {
            seq: 0,
            kind,
            node,
            content: String::new(),
            metadata: Map::new(),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    pub fn start() -> Self {
        Self::new(EventKind::Start, NodeLabel::System).with("step", 0)
    }

    pub fn content(text: impl Into<String>, chunk_number: u64, accumulated_length: usize) -> Self {
        Self::new(EventKind::Content, NodeLabel::Chatbot)
            .with_content(text)
            .with("chunk_number", chunk_number)
            .with("accumulated_length", accumulated_length)
    }

    pub fn ai_decision(turn_index: usize, requested: usize, honored: usize) -> Self {
        Self::new(EventKind::AiDecision, NodeLabel::Chatbot)
            .with_content("AI decided to call a tool")
            .with("turn_index", turn_index)
            .with("requested", requested)
            .with("honored", honored)
    }

    pub fn tool_call(call: &ToolCall) -> Self {
        Self::new(EventKind::ToolCall, NodeLabel::Chatbot)
            .with_content(format!("Preparing to call tool: {}", call.name))
            .with("tool_call_id", call.id.as_str())
            .with("tool_name", call.name.as_str())
            .with("tool_args", call.arguments_value())
    }

    pub fn tool_running(call: &ToolCall) -> Self {
        Self::new(EventKind::ToolRunning, NodeLabel::Tools)
            .with_content("Running tool...")
            .with("tool_call_id", call.id.as_str())
            .with("tool_name", call.name.as_str())
    }

    pub fn tool_result(call: &ToolCall, result: impl Into<String>, is_error: bool) -> Self {
        Self::new(EventKind::ToolResult, NodeLabel::Tools)
            .with_content("Tool finished")
            .with("tool_call_id", call.id.as_str())
            .with("tool_name", call.name.as_str())
            .with("result", result.into())
            .with("is_error", is_error)
    }

    /// Payload is passed through verbatim; its top-level keys are also
    /// lifted into metadata for clients that read `question`, `name`, ...
    pub fn intervention_required(thread_id: &ThreadId, call: &ToolCall, payload: &Value) -> Self {
        let question = payload
            .get("question")
            .or_else(|| payload.get("query"))
            .and_then(Value::as_str)
            .unwrap_or("Human input required");
        let mut event = Self::new(EventKind::InterventionRequired, NodeLabel::Tools)
            .with_content(question)
            .with("thread_id", thread_id.as_str())
            .with("tool_call_id", call.id.as_str())
            .with("payload", payload.clone());
        if let Some(fields) = payload.as_object() {
            for (k, v) in fields {
                if !RESERVED_METADATA.contains(&k.as_str()) {
                    event.metadata.insert(k.clone(), v.clone());
                }
            }
        }
        event
    }

    pub fn end(
        status: EndStatus,
        total_chunks: u64,
        total_length: usize,
        final_node: Option<NodeLabel>,
    ) -> Self {
        Self::new(EventKind::End, NodeLabel::System)
            .with("status", json!(status))
            .with("total_chunks", total_chunks)
            .with("total_length", total_length)
            .with("final_node", json!(final_node))
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::new(EventKind::Error, NodeLabel::System)
            .with_content(message)
            .with("code", code)
    }

    /// The `{type, content, metadata}` wire record.
    pub fn to_record(&self) -> Value {
        let mut metadata = Map::with_capacity(self.metadata.len() + 2);
        metadata.insert("node".into(), Value::String(self.node.as_str().into()));
        metadata.insert("seq".into(), Value::from(self.seq));
        for (k, v) in &self.metadata {
            metadata.insert(k.clone(), v.clone());
        }
        json!({
            "type": self.kind.as_str(),
            "content": self.content,
            "metadata": Value::Object(metadata),
        })
    }

    /// One NDJSON line, newline included.
    pub fn to_ndjson(&self) -> String {
        let mut line = self.to_record().to_string();
        line.push('\n');
        line
    }

    /// One SSE frame.
    pub fn to_sse(&self) -> String {
        format!("data: {}\n\n", self.to_record())
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_record().serialize(serializer)
    }
}
