//! Core types for Interlude

use crate::ledger::Ledger;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Reserved thread id used when the caller does not supply one.
pub const DEFAULT_THREAD_ID: &str = "default";

/// Thread identifier - cheaply cloneable
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ThreadId(Arc<str>);

impl ThreadId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Arc::from(s.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::new(DEFAULT_THREAD_ID)
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ThreadId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for ThreadId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<ThreadId> for String {
    fn from(id: ThreadId) -> Self {
        id.0.to_string()
    }
}

/// Key → value arguments of a tool call.
pub type Arguments = serde_json::Map<String, serde_json::Value>;

/// Who authored a turn
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Agent,
    ToolResult,
}

/// A tool call requested by the agent
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Arguments,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Build a call from a JSON value; anything but an object yields empty arguments.
    pub fn from_value(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        let arguments = match arguments {
            serde_json::Value::Object(map) => map,
            _ => Arguments::new(),
        };
        Self::new(id, name, arguments)
    }

    pub fn arguments_value(&self) -> serde_json::Value {
        serde_json::Value::Object(self.arguments.clone())
    }
}

/// One entry in a thread's ledger
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn agent(content: impl Into<String>) -> Self {
        Self {
            role: Role::Agent,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn agent_with_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Agent,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::ToolResult,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    pub fn requests_tools(&self) -> bool {
        self.role == Role::Agent && !self.tool_calls.is_empty()
    }
}

/// Lifecycle of a thread between and during runs
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ThreadStatus {
    #[default]
    Idle,
    Running,
    Suspended,
}

/// The open call a suspended thread is waiting on, plus the payload shown to the human.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PendingInterrupt {
    pub tool_call: ToolCall,
    pub payload: serde_json::Value,
}

/// Per-thread record held by the checkpoint store
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThreadState {
    pub thread_id: ThreadId,
    pub ledger: Ledger,
    pub pending_interrupt: Option<PendingInterrupt>,
    pub status: ThreadStatus,
    /// Auxiliary values written by suspending tools on resume (e.g. verified name).
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

impl ThreadState {
    pub fn new(thread_id: ThreadId) -> Self {
        Self {
            thread_id,
            ledger: Ledger::new(),
            pending_interrupt: None,
            status: ThreadStatus::Idle,
            fields: serde_json::Map::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.status == ThreadStatus::Suspended && self.pending_interrupt.is_some()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
