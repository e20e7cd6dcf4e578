//! Tools the model can call while answering a question.

use crate::rag::{CourseStore, SearchResults};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Name of the content search tool.
pub const SEARCH_TOOL_NAME: &str = "search_course_content";

/// Name of the course outline tool.
pub const OUTLINE_TOOL_NAME: &str = "get_course_outline";

/// Tool description advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the tool's arguments.
    pub input_schema: Value,
}

/// A source shown to the user alongside an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCitation {
    /// Display label, e.g. `"Introduction to MCP - Lesson 1"`.
    pub text: String,
    /// Deep link; serialized as `null` when absent.
    #[serde(default)]
    pub link: Option<String>,
}

/// A model-callable tool that may record citations for its last call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Definition advertised to the model.
    fn definition(&self) -> ToolDefinition;

    /// Run the tool. Failures are reported in the returned text.
    async fn execute(&mut self, args: &Value) -> String;

    /// Citations recorded by the most recent call.
    fn sources(&self) -> &[SourceCitation];

    /// Take the recorded citations, leaving the buffer empty.
    fn take_sources(&mut self) -> Vec<SourceCitation>;
}

fn invalid_arguments(tool: &str, error: serde_json::Error) -> String {
    format!("Invalid arguments for {}: {}", tool, error)
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    course_name: Option<String>,
    #[serde(default)]
    lesson_number: Option<u32>,
}

/// Semantic search over lesson content.
pub struct CourseSearchTool {
    store: Arc<CourseStore>,
    last_sources: Vec<SourceCitation>,
}

impl CourseSearchTool {
    /// Create a search tool over a course store.
    pub fn new(store: Arc<CourseStore>) -> Self {
        Self {
            store,
            last_sources: Vec::new(),
        }
    }

    async fn format_results(&mut self, results: &SearchResults) -> String {
        let mut blocks = Vec::with_capacity(results.hits().len());
        let mut sources = Vec::with_capacity(results.hits().len());

        for hit in results.hits() {
            let course_title = &hit.metadata.course_title;
            let mut label = course_title.clone();
            let mut link = None;

            if let Some(n) = hit.metadata.lesson_number {
                label.push_str(&format!(" - Lesson {}", n));
                link = match self.store.get_lesson_link(course_title, n).await {
                    Ok(link) => link,
                    Err(e) => {
                        warn!("Lesson link lookup failed for '{}': {}", label, e);
                        None
                    }
                };
            }

            blocks.push(format!("[{}]\n{}", label, hit.document));
            sources.push(SourceCitation { text: label, link });
        }

        self.last_sources = sources;
        blocks.join("\n\n")
    }
}

#[async_trait]
impl Tool for CourseSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: SEARCH_TOOL_NAME.to_string(),
            description: "Search course materials with smart course name matching and lesson filtering"
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What to search for in the course content"
                    },
                    "course_name": {
                        "type": "string",
                        "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                    },
                    "lesson_number": {
                        "type": "integer",
                        "description": "Specific lesson number to search within (e.g. 1, 2, 3)"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn execute(&mut self, args: &Value) -> String {
        self.last_sources.clear();

        let args: SearchArgs = match serde_json::from_value(args.clone()) {
            Ok(args) => args,
            Err(e) => return invalid_arguments(SEARCH_TOOL_NAME, e),
        };

        let results = self
            .store
            .search(&args.query, args.course_name.as_deref(), args.lesson_number)
            .await;

        if let Some(error) = results.error_message() {
            return error.to_string();
        }

        if results.is_empty() {
            let mut message = "No relevant content found".to_string();
            if let Some(course) = args.course_name.as_deref().filter(|c| !c.trim().is_empty()) {
                message.push_str(&format!(" in course '{}'", course));
            }
            if let Some(n) = args.lesson_number {
                message.push_str(&format!(" in lesson {}", n));
            }
            message.push('.');
            return message;
        }

        debug!("Search returned {} hits", results.hits().len());
        self.format_results(&results).await
    }

    fn sources(&self) -> &[SourceCitation] {
        &self.last_sources
    }

    fn take_sources(&mut self) -> Vec<SourceCitation> {
        std::mem::take(&mut self.last_sources)
    }
}

#[derive(Debug, Deserialize)]
struct OutlineArgs {
    course_title: String,
}

/// Course outline lookup: title, link, instructor and lesson list.
pub struct CourseOutlineTool {
    store: Arc<CourseStore>,
    last_sources: Vec<SourceCitation>,
}

impl CourseOutlineTool {
    /// Create an outline tool over a course store.
    pub fn new(store: Arc<CourseStore>) -> Self {
        Self {
            store,
            last_sources: Vec::new(),
        }
    }

    async fn outline(&mut self, name: &str) -> String {
        let title = match self.store.resolve_course_name(name).await {
            Ok(Some(title)) => title,
            Ok(None) => return format!("No course found matching '{}'", name),
            Err(e) => return format!("Course lookup error: {}", e),
        };

        let course = match self.store.get_course_outline_metadata(&title).await {
            Ok(Some(course)) => course,
            Ok(None) => return format!("Course metadata not found for '{}'", title),
            Err(e) => return format!("Course lookup error: {}", e),
        };

        let mut lessons: Vec<_> = course.lessons.iter().collect();
        lessons.sort_by_key(|l| l.lesson_number);

        let mut out = format!("**{}**\n", course.title);
        if let Some(instructor) = &course.instructor {
            out.push_str(&format!("Instructor: {}\n", instructor));
        }
        if let Some(link) = &course.course_link {
            out.push_str(&format!("Course Link: {}\n", link));
        }
        out.push_str(&format!("\n**Course Outline ({} lessons):**\n", lessons.len()));
        for lesson in lessons {
            out.push_str(&format!("• Lesson {}: {}\n", lesson.lesson_number, lesson.lesson_title));
        }

        self.last_sources = vec![SourceCitation {
            text: course.title.clone(),
            link: course.course_link.clone(),
        }];

        out.trim_end().to_string()
    }
}

#[async_trait]
impl Tool for CourseOutlineTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: OUTLINE_TOOL_NAME.to_string(),
            description: "Get the complete outline of a course: title, course link, instructor \
                and the numbered list of lessons"
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "course_title": {
                        "type": "string",
                        "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                    }
                },
                "required": ["course_title"]
            }),
        }
    }

    async fn execute(&mut self, args: &Value) -> String {
        self.last_sources.clear();

        match serde_json::from_value::<OutlineArgs>(args.clone()) {
            Ok(args) => self.outline(&args.course_title).await,
            Err(e) => invalid_arguments(OUTLINE_TOOL_NAME, e),
        }
    }

    fn sources(&self) -> &[SourceCitation] {
        &self.last_sources
    }

    fn take_sources(&mut self) -> Vec<SourceCitation> {
        std::mem::take(&mut self.last_sources)
    }
}
