//! Interlude Tools - tool contract, registry, and builtin tools
//!
//! Each tool is a self-contained file in src/tools/.
//! The human-assistance tool is special: instead of producing a result it
//! returns a `SuspendSignal`, and its answer arrives later through `resolve`.

pub mod registry;
pub mod tools;

pub use registry::{Resolution, SuspendSignal, Tool, ToolOutcome, ToolRegistry, ToolResult};
pub use tools::func::FnTool;
pub use tools::human::{AssistanceMode, HumanAssistanceTool, HUMAN_ASSISTANCE};
pub use tools::search::WebSearchTool;

use interlude_core::Result;

/// Create the default tool registry: web search plus the human-assistance entry.
pub fn create_default_registry(mode: AssistanceMode) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();

    registry.register(WebSearchTool::new())?;
    registry.register(HumanAssistanceTool::new(mode))?;

    Ok(registry)
}
