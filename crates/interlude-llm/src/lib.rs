//! Interlude LLM - Provider adapters with streaming support

pub mod anthropic;
pub mod provider;
pub mod scripted;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use provider::{LlmError, LlmProvider, LlmResult, LlmStream};
pub use scripted::{Script, ScriptedProvider};
pub use tokio_util::sync::CancellationToken;
pub use types::*;
