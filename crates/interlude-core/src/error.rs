//! Error types for Interlude

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("ledger integrity violated: {0}")]
    LedgerIntegrity(String),

    #[error("tool already registered: {0}")]
    DuplicateTool(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("tool error: {name} - {message}")]
    ToolExecution { name: String, message: String },

    #[error("step limit exceeded: {limit} reasoning steps")]
    StepLimitExceeded { limit: usize },

    #[error("no pending interrupt for thread {0}")]
    NoPendingInterrupt(String),

    #[error("thread is busy: {0}")]
    ThreadBusy(String),

    #[error("thread {0} is waiting for human input; resume it first")]
    ThreadSuspended(String),

    #[error("reasoner error: {provider} - {message}")]
    Reasoner { provider: String, message: String },

    #[error("checkpoint store error: {0}")]
    Store(String),

    #[error("cancelled")]
    Cancelled,

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn ledger(message: impl Into<String>) -> Self {
        Self::LedgerIntegrity(message.into())
    }

    pub fn tool_error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn reasoner(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Reasoner {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Stable snake_case identifier used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            Self::LedgerIntegrity(_) => "ledger_integrity",
            Self::DuplicateTool(_) => "duplicate_tool",
            Self::UnknownTool(_) => "unknown_tool",
            Self::ToolExecution { .. } => "tool_execution",
            Self::StepLimitExceeded { .. } => "step_limit_exceeded",
            Self::NoPendingInterrupt(_) => "no_pending_interrupt",
            Self::ThreadBusy(_) => "thread_busy",
            Self::ThreadSuspended(_) => "thread_suspended",
            Self::Reasoner { .. } => "reasoner",
            Self::Store(_) => "store",
            Self::Cancelled => "cancelled",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Internal(_) => "internal",
        }
    }

    /// Tool failures are fed back to the reasoner as tool_result turns
    /// instead of ending the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnknownTool(_) | Self::ToolExecution { .. })
    }
}
