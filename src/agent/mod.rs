//! Answer generation with tool calling.
//!
//! The [`Agent`] drives a chat model through a bounded number of tool rounds.
//! Tools are held by a per-request [`ToolManager`], which also collects the
//! citations the tools record.

mod manager;
mod model;
mod runner;
mod tools;

pub use manager::ToolManager;
pub use model::{ChatModel, ChatRequest, Message, ModelTurn, OpenAIChatModel, ToolInvocation};
pub use runner::{Agent, AgentResponse, ToolCallRecord, FALLBACK_ANSWER};
pub use tools::{
    CourseOutlineTool, CourseSearchTool, SourceCitation, Tool, ToolDefinition, OUTLINE_TOOL_NAME,
    SEARCH_TOOL_NAME,
};
