//! Registry of tools available to the model.

use super::tools::{CourseOutlineTool, CourseSearchTool, SourceCitation, Tool, ToolDefinition};
use crate::error::{LektorError, Result};
use crate::rag::CourseStore;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Holds tools by name in registration order and dispatches calls to them.
#[derive(Default)]
pub struct ToolManager {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager with the content search and outline tools registered.
    pub fn with_course_tools(store: Arc<CourseStore>) -> Self {
        Self {
            tools: vec![
                Box::new(CourseSearchTool::new(store.clone())),
                Box::new(CourseOutlineTool::new(store)),
            ],
        }
    }

    /// Register a tool. A tool with an existing name replaces the old one in place.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<()> {
        let name = tool.definition().name;
        if name.trim().is_empty() {
            return Err(LektorError::InvalidInput(
                "Tool definition must have a name".to_string(),
            ));
        }

        match self.tools.iter().position(|t| t.definition().name == name) {
            Some(idx) => {
                warn!("Replacing already registered tool '{}'", name);
                self.tools[idx] = tool;
            }
            None => self.tools.push(tool),
        }
        Ok(())
    }

    /// Names of registered tools, in registration order.
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.definition().name).collect()
    }

    /// Definitions of all registered tools, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Run a tool by name. Unknown names produce a message, not an error.
    pub async fn execute_tool(&mut self, name: &str, args: &Value) -> String {
        match self.tools.iter_mut().find(|t| t.definition().name == name) {
            Some(tool) => {
                info!("Calling tool: {} with args: {}", name, args);
                tool.execute(args).await
            }
            None => {
                warn!("Model requested unknown tool '{}'", name);
                format!("Tool '{}' not found", name)
            }
        }
    }

    /// Citations from the first tool (in registration order) holding any.
    pub fn last_sources(&self) -> Vec<SourceCitation> {
        self.tools
            .iter()
            .map(|t| t.sources())
            .find(|s| !s.is_empty())
            .map(|s| s.to_vec())
            .unwrap_or_default()
    }

    /// Empty every tool's citation buffer.
    pub fn reset_sources(&mut self) {
        for tool in &mut self.tools {
            tool.take_sources();
        }
    }
}
