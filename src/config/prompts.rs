//! Prompt templates for Lektor.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub generation: GenerationPrompts,
}

/// Prompts for the tool-using answer generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationPrompts {
    /// System prompt. `{{max_tool_rounds}}` is substituted at render time.
    pub system: String,
}

impl Default for GenerationPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an assistant for questions about course materials. You can look things up in the indexed courses with two tools.

Tools:
- search_course_content: find passages inside lessons. Use it for questions about what a course or lesson teaches, explanations, examples and details.
- get_course_outline: fetch a course's title, link, instructor and complete lesson list. Use it for questions about course structure, lesson lists or "what does course X cover".

When to use them:
- Course-specific questions: call the appropriate tool before answering.
- General knowledge questions: answer directly, without tools.
- Prefer a single tool call per question. You have at most {{max_tool_rounds}} rounds of tool calls; after that you must answer with what you have.
- Course names may be partial ("MCP", "Chroma"); pass them as given and the tool will find the closest course.

Answering outline questions:
- Give the course title, course link and every lesson with its number and title.

Answering content questions:
- Build the answer from the retrieved passages. If nothing relevant was found, say so plainly.

Style:
- Answer directly. Do not describe your search process or mention tools.
- Be brief, clear and accurate."#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts, applying overrides from an optional custom directory.
    pub fn load(custom_dir: Option<&str>) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let generation_path = custom_path.join("generation.toml");
            if generation_path.exists() {
                let content = std::fs::read_to_string(&generation_path)?;
                prompts.generation = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render the generation system prompt for a given tool-round budget.
    pub fn generation_system(&self, max_tool_rounds: usize) -> String {
        let mut vars = HashMap::new();
        vars.insert("max_tool_rounds".to_string(), max_tool_rounds.to_string());
        Self::render(&self.generation.system, &vars)
    }
}
