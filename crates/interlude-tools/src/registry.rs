//! Tool registry and trait definitions

use interlude_core::{Arguments, Error, Result, ToolCall};
use interlude_llm::LlmTool;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// What a tool executor hands back.
#[derive(Clone, Debug)]
pub enum ToolResult {
    Text(String),
    Json(Value),
    Error(String),
    /// Stop the run and wait for a human; the payload is shown verbatim.
    Suspend(SuspendSignal),
}

impl ToolResult {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn error(s: impl Into<String>) -> Self {
        Self::Error(s.into())
    }

    pub fn suspend(payload: Value) -> Self {
        Self::Suspend(SuspendSignal { payload })
    }

    pub fn to_content_string(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Json(v) => serde_json::to_string_pretty(v).unwrap_or_default(),
            Self::Error(e) => format!("Error: {}", e),
            Self::Suspend(s) => s.payload.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn is_suspend(&self) -> bool {
        matches!(self, Self::Suspend(_))
    }
}

/// Distinguished return value of a suspending tool.
#[derive(Clone, Debug, PartialEq)]
pub struct SuspendSignal {
    pub payload: Value,
}

/// Successful outcome of `ToolRegistry::invoke`.
#[derive(Clone, Debug)]
pub enum ToolOutcome {
    Output(String),
    Suspend(SuspendSignal),
}

/// A suspending tool's answer once human input arrives.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Resolution {
    /// Content of the tool_result turn.
    pub content: String,
    /// Auxiliary thread fields to merge (e.g. a corrected name).
    pub updates: serde_json::Map<String, Value>,
}

impl Resolution {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            updates: serde_json::Map::new(),
        }
    }

    pub fn with_update(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.updates.insert(key.to_string(), value.into());
        self
    }
}

/// The Tool trait - implement this to add a new capability.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name (e.g. "web_search").
    fn name(&self) -> &str;

    /// Human-readable description sent to the LLM.
    fn description(&self) -> &str;

    /// JSON Schema for input parameters.
    fn input_schema(&self) -> Value;

    /// Whether calling this tool always suspends the run for human input.
    fn suspends(&self) -> bool {
        false
    }

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Arguments) -> ToolResult;

    /// Execute with cancellation support. Default: race execute() against cancellation.
    async fn execute_cancellable(&self, args: Arguments, cancel: CancellationToken) -> ToolResult {
        tokio::select! {
            result = self.execute(args) => result,
            _ = cancel.cancelled() => ToolResult::text("[cancelled]"),
        }
    }

    /// Turn human input into this tool's result. Only suspending tools answer.
    fn resolve(&self, _args: &Arguments, _resume: &Value) -> Option<Resolution> {
        None
    }

    /// Convert to the LLM tool definition format.
    fn to_llm_tool(&self) -> LlmTool {
        LlmTool {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// Name → tool map, built once at startup and read-only afterwards.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Fails with `DuplicateTool` if the name is taken.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(Error::DuplicateTool(name));
        }
        self.tools.insert(name, Arc::new(tool));
        Ok(())
    }

    /// Register a closure as a tool.
    pub fn register_fn<F, Fut>(
        &mut self,
        name: impl Into<String>,
        input_schema: Value,
        executor: F,
    ) -> Result<()>
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ToolResult> + Send + 'static,
    {
        let name = name.into();
        let description = format!("{} tool", name);
        self.register(crate::FnTool::new(name, description, input_schema, executor))
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Whether a call to `name` routes to suspension.
    pub fn suspends(&self, name: &str) -> bool {
        self.tools.get(name).is_some_and(|t| t.suspends())
    }

    /// Invoke a tool. Executor failures surface as `ToolExecution`, a missing
    /// tool as `UnknownTool`, and a fired token as `Cancelled`.
    pub async fn invoke(
        &self,
        name: &str,
        args: Arguments,
        cancel: CancellationToken,
    ) -> Result<ToolOutcome> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| Error::UnknownTool(name.to_string()))?;
        debug!(tool = name, "invoking tool");
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            r = tool.execute_cancellable(args, cancel.clone()) => r,
        };
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        match result {
            ToolResult::Suspend(signal) => Ok(ToolOutcome::Suspend(signal)),
            ToolResult::Error(message) => Err(Error::tool_error(name, message)),
            other => Ok(ToolOutcome::Output(other.to_content_string())),
        }
    }

    /// Feed human input to the tool behind a suspended call.
    pub fn resolve(&self, call: &ToolCall, resume: &Value) -> Result<Resolution> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| Error::UnknownTool(call.name.clone()))?;
        tool.resolve(&call.arguments, resume)
            .ok_or_else(|| Error::tool_error(&call.name, "tool does not accept resume input"))
    }

    /// Get LLM tool definitions for all tools.
    pub fn get_definitions(&self) -> Vec<LlmTool> {
        self.tools.values().map(|t| t.to_llm_tool()).collect()
    }

    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
