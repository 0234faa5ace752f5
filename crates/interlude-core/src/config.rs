//! Configuration types
//!
//! Pure serde structs. File loading and env/CLI overrides live in interlude-gateway.

use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Executor tuning
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub model: String,
    /// Upper bound on reasoning steps per run.
    pub max_steps: usize,
    pub max_tokens: u32,
    pub system_prompt: Option<String>,
    /// Tool output longer than this is truncated before it enters the ledger.
    pub max_tool_output_chars: usize,
    /// Capacity of the per-run signal channel.
    pub event_buffer: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_steps: 25,
            max_tokens: 8192,
            system_prompt: None,
            max_tool_output_chars: 50_000,
            event_buffer: 256,
        }
    }
}

/// Gateway configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub bind: BindMode,
}

fn default_port() -> u16 {
    18790
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: BindMode::default(),
        }
    }
}

/// Bind mode for the gateway
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    #[default]
    Loopback,
    Lan,
}

impl BindMode {
    pub fn to_addr(&self) -> &str {
        match self {
            BindMode::Loopback => "127.0.0.1",
            BindMode::Lan => "0.0.0.0",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "lan" | "0.0.0.0" | "all" => BindMode::Lan,
            _ => BindMode::Loopback,
        }
    }
}

/// Which LLM binding backs the reasoner
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Anthropic,
    /// Deterministic canned replies, no network.
    Scripted,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_url: Option<String>,
    /// Name of the env var holding the API key.
    pub api_key_env: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            api_url: None,
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
        }
    }
}

/// Top-level configuration file layout.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InterludeConfig {
    pub gateway: GatewayConfig,
    pub agent: ExecutorConfig,
    pub provider: ProviderConfig,
}
