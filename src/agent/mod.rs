//! Agent module - the tool-calling variant of the loop.
//!
//! The dispatcher follows a "tools in a loop" pattern:
//! 1. Start from the user's task as the only message
//! 2. Call the model with the registered tool schemas
//! 3. If the model requests tool calls, execute them and feed results back
//! 4. Repeat until the model answers or the turn budget is exhausted

mod agent_loop;
mod conversation;
mod prompt;
mod research;

pub use agent_loop::{
    AbortReason, DispatchState, SessionOutcome, SessionReport, ToolDispatcher, ToolResult,
};
pub use conversation::Conversation;
pub use prompt::{build_assistant_prompt, build_research_prompt};
pub use research::{find_references, RESEARCH_TOOLS};
