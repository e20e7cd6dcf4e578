//! Question answering over the course catalog.

use super::CourseStore;
use crate::agent::{Agent, SourceCitation, ToolManager};
use crate::error::Result;
use crate::session::SessionStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

/// Answer given for a blank question; the model is not consulted.
pub const EMPTY_QUERY_ANSWER: &str = "Please ask a question about the course materials.";

/// RAG system: sessions, tools and the generation loop.
pub struct RagSystem {
    course_store: Arc<CourseStore>,
    agent: Agent,
    sessions: Arc<dyn SessionStore>,
}

impl RagSystem {
    /// Create a new RAG system.
    pub fn new(course_store: Arc<CourseStore>, agent: Agent, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            course_store,
            agent,
            sessions,
        }
    }

    /// The course store backing the tools.
    pub fn course_store(&self) -> &Arc<CourseStore> {
        &self.course_store
    }

    /// The session store.
    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// A fresh tool manager with the course tools. Each query gets its own,
    /// so citation buffers never leak between requests.
    pub fn tool_manager(&self) -> ToolManager {
        ToolManager::with_course_tools(self.course_store.clone())
    }

    /// Answer a question, optionally within an existing session.
    ///
    /// Without a session id a new session is created. History is only
    /// extended when generation succeeds.
    #[instrument(skip(self))]
    pub async fn query(&self, query: &str, session_id: Option<&str>) -> Result<RagResponse> {
        let session_id = match session_id {
            Some(id) => id.to_string(),
            None => self.sessions.create_session().await?,
        };

        if query.trim().is_empty() {
            return Ok(RagResponse {
                answer: EMPTY_QUERY_ANSWER.to_string(),
                sources: Vec::new(),
                session_id,
            });
        }

        info!("Processing question: {}", query);

        let history = self.sessions.history(&session_id).await?;
        let mut tools = self.tool_manager();
        tools.reset_sources();

        let response = self.agent.run(query, &history, &mut tools).await?;

        let sources = tools.last_sources();
        tools.reset_sources();

        self.sessions
            .append_exchange(&session_id, query, &response.content)
            .await?;

        info!(
            "Answered with {} tool call(s), {} source(s)",
            response.tool_calls.len(),
            sources.len()
        );

        Ok(RagResponse {
            answer: response.content,
            sources,
            session_id,
        })
    }

    /// Number and titles of indexed courses.
    pub async fn get_analytics(&self) -> Result<CourseAnalytics> {
        let course_titles = self.course_store.get_existing_course_titles().await?;
        Ok(CourseAnalytics {
            total_courses: course_titles.len(),
            course_titles,
        })
    }
}

/// Response from a RAG query.
#[derive(Debug, Clone, Serialize)]
pub struct RagResponse {
    /// The generated answer. Never empty.
    pub answer: String,
    /// Citations from the last tool that recorded any.
    pub sources: Vec<SourceCitation>,
    /// Session the exchange belongs to.
    pub session_id: String,
}

/// Catalog summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseAnalytics {
    pub total_courses: usize,
    pub course_titles: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ModelTurn;
    use crate::error::LektorError;
    use crate::session::{ConversationTurn, MemorySessionStore};
    use crate::test_support::{seeded_course_store, tool_use, ScriptedChatModel};
    use serde_json::json;

    async fn system(script: Vec<ModelTurn>, max_history: usize) -> (RagSystem, Arc<ScriptedChatModel>) {
        let model = Arc::new(ScriptedChatModel::new(script));
        let rag = RagSystem::new(
            Arc::new(seeded_course_store().await),
            Agent::new(model.clone(), "system"),
            Arc::new(MemorySessionStore::new(max_history)),
        );
        (rag, model)
    }

    #[tokio::test]
    async fn test_lesson_question_returns_single_citation() {
        let (rag, _) = system(
            vec![
                tool_use(
                    "call_1",
                    "search_course_content",
                    json!({"query": "servers", "course_name": "Introduction to MCP", "lesson_number": 1}),
                ),
                ModelTurn::Answer("MCP servers expose tools, resources and prompts.".to_string()),
            ],
            2,
        )
        .await;

        let response = rag
            .query("What do servers do in lesson 1 of Introduction to MCP?", None)
            .await
            .unwrap();

        assert_eq!(response.answer, "MCP servers expose tools, resources and prompts.");
        assert_eq!(
            response.sources,
            vec![SourceCitation {
                text: "Introduction to MCP - Lesson 1".to_string(),
                link: Some("https://example.com/mcp/lesson-1".to_string()),
            }]
        );
        assert!(response.session_id.starts_with("session_"));
    }

    #[tokio::test]
    async fn test_outline_question_cites_course() {
        let (rag, _) = system(
            vec![
                tool_use("c", "get_course_outline", json!({"course_title": "MCP"})),
                ModelTurn::Answer("Three lessons.".to_string()),
            ],
            2,
        )
        .await;

        let response = rag.query("Outline of the MCP course?", None).await.unwrap();
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.sources[0].text, "Introduction to MCP");
        assert_eq!(response.sources[0].link.as_deref(), Some("https://example.com/mcp"));
    }

    #[tokio::test]
    async fn test_general_question_has_no_sources() {
        let (rag, _) = system(vec![ModelTurn::Answer("4".to_string())], 2).await;
        let response = rag.query("What is 2 + 2?", None).await.unwrap();
        assert_eq!(response.answer, "4");
        assert!(response.sources.is_empty());
    }

    #[tokio::test]
    async fn test_empty_query() {
        let (rag, model) = system(Vec::new(), 2).await;
        let response = rag.query("   ", None).await.unwrap();
        assert_eq!(response.answer, EMPTY_QUERY_ANSWER);
        assert!(response.sources.is_empty());
        assert!(model.requests().is_empty());
    }

    #[tokio::test]
    async fn test_session_history_grows_and_is_capped() {
        let (rag, model) = system(
            vec![
                ModelTurn::Answer("a1".to_string()),
                ModelTurn::Answer("a2".to_string()),
                ModelTurn::Answer("a3".to_string()),
            ],
            2,
        )
        .await;

        let first = rag.query("q1", None).await.unwrap();
        let id = first.session_id.clone();
        rag.query("q2", Some(&id)).await.unwrap();
        rag.query("q3", Some(&id)).await.unwrap();

        let requests = model.requests();
        assert_eq!(requests[1].messages.len(), 3);
        assert_eq!(requests[2].messages.len(), 3);

        let history = rag.sessions().history(&id).await.unwrap();
        assert_eq!(
            history,
            vec![ConversationTurn::user("q3"), ConversationTurn::assistant("a3")]
        );
    }

    #[tokio::test]
    async fn test_failed_generation_leaves_history_untouched() {
        let (rag, _) = system(Vec::new(), 2).await;
        let id = rag.sessions().create_session().await.unwrap();

        let result = rag.query("q", Some(&id)).await;
        assert!(matches!(result, Err(LektorError::Agent(_))));
        assert!(rag.sessions().history(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sources_do_not_leak_between_queries() {
        let (rag, _) = system(
            vec![
                tool_use(
                    "c",
                    "search_course_content",
                    json!({"query": "servers", "course_name": "MCP", "lesson_number": 1}),
                ),
                ModelTurn::Answer("first".to_string()),
                ModelTurn::Answer("second".to_string()),
            ],
            2,
        )
        .await;

        assert_eq!(rag.query("q1", None).await.unwrap().sources.len(), 1);
        assert!(rag.query("q2", None).await.unwrap().sources.is_empty());
    }

    #[tokio::test]
    async fn test_analytics() {
        let (rag, _) = system(Vec::new(), 2).await;
        let analytics = rag.get_analytics().await.unwrap();
        assert_eq!(analytics.total_courses, 2);
        assert_eq!(
            analytics.course_titles,
            vec![
                "Building Towards Computer Use".to_string(),
                "Introduction to MCP".to_string()
            ]
        );
    }
}
