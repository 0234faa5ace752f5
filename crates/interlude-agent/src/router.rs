//! Routing after a reasoning step

use interlude_core::{ToolCall, Turn};
use interlude_tools::ToolRegistry;
use tracing::warn;

#[derive(Clone, Debug, PartialEq)]
pub enum Route {
    /// No tool requested; the run completes.
    Finish,
    /// Execute the call and loop back to reasoning.
    Act(ToolCall),
    /// The call needs a human; the run suspends.
    Suspend(ToolCall),
}

/// Keep only the first tool call of an agent turn. Returns how many were dropped.
pub fn enforce_single_call(turn: &mut Turn) -> usize {
    let requested = turn.tool_calls.len();
    if requested <= 1 {
        return 0;
    }
    turn.tool_calls.truncate(1);
    warn!(
        requested,
        honored = 1,
        tool = %turn.tool_calls[0].name,
        "agent requested several tool calls; honoring the first"
    );
    requested - 1
}

pub fn route(turn: &Turn, tools: &ToolRegistry) -> Route {
    match turn.tool_calls.first() {
        None => Route::Finish,
        Some(call) if tools.suspends(&call.name) => Route::Suspend(call.clone()),
        Some(call) => Route::Act(call.clone()),
    }
}
