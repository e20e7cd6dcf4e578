//! Agent runner with a bounded tool calling loop.

use super::manager::ToolManager;
use super::model::{ChatModel, ChatRequest, Message, ModelTurn, ToolInvocation};
use crate::config::{LlmSettings, Prompts};
use crate::error::Result;
use crate::session::{ConversationTurn, Role};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Returned when the model produces no text at all.
pub const FALLBACK_ANSWER: &str =
    "I wasn't able to put together an answer to that. Please try rephrasing your question.";

/// Where the loop is between model calls.
enum LoopState {
    AwaitingModel,
    ExecutingTools(Vec<ToolInvocation>),
    Done(String),
}

/// Agent that answers questions, calling tools for at most `max_tool_rounds` rounds.
pub struct Agent {
    model: Arc<dyn ChatModel>,
    system_prompt: String,
    max_tool_rounds: usize,
    max_tokens: u32,
    temperature: f32,
}

impl Agent {
    /// Create a new agent around a chat model.
    pub fn new(model: Arc<dyn ChatModel>, system_prompt: &str) -> Self {
        Self {
            model,
            system_prompt: system_prompt.to_string(),
            max_tool_rounds: 2,
            max_tokens: 800,
            temperature: 0.0,
        }
    }

    /// Create an agent configured from LLM settings and prompts.
    pub fn from_settings(model: Arc<dyn ChatModel>, settings: &LlmSettings, prompts: &Prompts) -> Self {
        Self::new(model, &prompts.generation_system(settings.max_tool_rounds))
            .with_max_tool_rounds(settings.max_tool_rounds)
            .with_max_tokens(settings.max_tokens)
            .with_temperature(settings.temperature)
    }

    /// Set the maximum number of tool rounds per question.
    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    /// Set the completion token limit.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Maximum tool rounds per question.
    pub fn max_tool_rounds(&self) -> usize {
        self.max_tool_rounds
    }

    /// Answer a question given prior conversation turns.
    ///
    /// Tool calls run sequentially in the order the model requested them.
    /// Once the round limit is reached the model is called once more without
    /// tools, so the loop always ends with a text answer.
    pub async fn run(
        &self,
        query: &str,
        history: &[ConversationTurn],
        tools: &mut ToolManager,
    ) -> Result<AgentResponse> {
        let mut messages: Vec<Message> = history
            .iter()
            .map(|turn| match turn.role {
                Role::User => Message::User(turn.content.clone()),
                Role::Assistant => Message::Assistant(turn.content.clone()),
            })
            .collect();
        messages.push(Message::User(query.to_string()));

        let definitions = tools.definitions();
        let mut rounds = 0;
        let mut model_calls = 0;
        let mut tool_calls_made = Vec::new();
        let mut state = LoopState::AwaitingModel;

        loop {
            state = match state {
                LoopState::AwaitingModel => {
                    let tools_enabled = rounds < self.max_tool_rounds && !definitions.is_empty();
                    let request = ChatRequest {
                        system: self.system_prompt.clone(),
                        messages: messages.clone(),
                        tools: if tools_enabled {
                            definitions.clone()
                        } else {
                            Vec::new()
                        },
                        max_tokens: self.max_tokens,
                        temperature: self.temperature,
                    };

                    model_calls += 1;
                    debug!("Model call {} (tools enabled: {})", model_calls, tools_enabled);

                    match self.model.complete(&request).await? {
                        ModelTurn::Answer(text) => LoopState::Done(text),
                        ModelTurn::ToolUse { text, calls } if tools_enabled => {
                            messages.push(Message::AssistantToolCalls {
                                text,
                                calls: calls.clone(),
                            });
                            LoopState::ExecutingTools(calls)
                        }
                        ModelTurn::ToolUse { text, .. } => {
                            warn!("Model requested tools after the round limit; ignoring");
                            LoopState::Done(text.unwrap_or_default())
                        }
                    }
                }
                LoopState::ExecutingTools(calls) => {
                    rounds += 1;
                    info!("Tool round {}/{}: {} call(s)", rounds, self.max_tool_rounds, calls.len());

                    for call in calls {
                        let result = tools.execute_tool(&call.name, &call.arguments).await;
                        messages.push(Message::ToolResult {
                            call_id: call.id.clone(),
                            content: result.clone(),
                        });
                        tool_calls_made.push(ToolCallRecord {
                            name: call.name,
                            arguments: call.arguments.to_string(),
                            result,
                        });
                    }
                    LoopState::AwaitingModel
                }
                LoopState::Done(text) => {
                    let content = if text.trim().is_empty() {
                        FALLBACK_ANSWER.to_string()
                    } else {
                        text
                    };
                    return Ok(AgentResponse {
                        content,
                        tool_calls: tool_calls_made,
                        rounds,
                        model_calls,
                    });
                }
            };
        }
    }
}

/// Response from an agent run.
#[derive(Debug)]
pub struct AgentResponse {
    /// The final answer text. Never empty.
    pub content: String,
    /// Record of all tool calls made during execution.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Number of tool rounds executed.
    pub rounds: usize,
    /// Number of model calls made.
    pub model_calls: usize,
}

/// Record of a tool call made by the agent.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    /// Name of the tool called.
    pub name: String,
    /// JSON arguments passed to the tool.
    pub arguments: String,
    /// Result returned by the tool.
    pub result: String,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LektorError;
    use crate::test_support::{seeded_course_store, tool_use, ScriptedChatModel};
    use serde_json::json;

    async fn course_tools() -> ToolManager {
        ToolManager::with_course_tools(Arc::new(seeded_course_store().await))
    }

    #[test]
    fn test_tool_call_record_display() {
        let record = ToolCallRecord {
            name: "search_course_content".to_string(),
            arguments: r#"{"query":"test"}"#.to_string(),
            result: "Found results".to_string(),
        };
        assert_eq!(format!("{}", record), r#"search_course_content({"query":"test"})"#);
    }

    #[tokio::test]
    async fn test_direct_answer_uses_one_call() {
        let model = Arc::new(ScriptedChatModel::new(vec![ModelTurn::Answer("Hello".to_string())]));
        let agent = Agent::new(model.clone(), "system");
        let mut tools = course_tools().await;

        let response = agent.run("Hi", &[], &mut tools).await.unwrap();
        assert_eq!(response.content, "Hello");
        assert_eq!(response.rounds, 0);
        assert_eq!(response.model_calls, 1);

        let requests = model.requests();
        assert_eq!(requests[0].tools.len(), 2);
        assert_eq!(requests[0].messages, vec![Message::User("Hi".to_string())]);
    }

    #[tokio::test]
    async fn test_tool_round_then_answer() {
        let model = Arc::new(ScriptedChatModel::new(vec![
            tool_use(
                "call_1",
                "search_course_content",
                json!({"query": "servers", "course_name": "MCP", "lesson_number": 1}),
            ),
            ModelTurn::Answer("MCP servers expose tools.".to_string()),
        ]));
        let agent = Agent::new(model.clone(), "system");
        let mut tools = course_tools().await;

        let response = agent.run("What do MCP servers do?", &[], &mut tools).await.unwrap();
        assert_eq!(response.content, "MCP servers expose tools.");
        assert_eq!(response.rounds, 1);
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(tools.last_sources().len(), 1);

        let requests = model.requests();
        assert_eq!(requests.len(), 2);
        let last = &requests[1].messages;
        assert!(matches!(last[1], Message::AssistantToolCalls { .. }));
        match &last[2] {
            Message::ToolResult { call_id, content } => {
                assert_eq!(call_id, "call_1");
                assert!(content.starts_with("[Introduction to MCP - Lesson 1]"));
            }
            other => panic!("Expected tool result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_round_limit_forces_final_call_without_tools() {
        let model = Arc::new(ScriptedChatModel::new(vec![
            tool_use("c1", "get_course_outline", json!({"course_title": "MCP"})),
            tool_use("c2", "search_course_content", json!({"query": "servers"})),
            ModelTurn::Answer("Done".to_string()),
        ]));
        let agent = Agent::new(model.clone(), "system").with_max_tool_rounds(2);
        let mut tools = course_tools().await;

        let response = agent.run("Compare", &[], &mut tools).await.unwrap();
        assert_eq!(response.content, "Done");
        assert_eq!(response.rounds, 2);
        assert_eq!(response.model_calls, 3);

        let requests = model.requests();
        assert!(!requests[0].tools.is_empty());
        assert!(!requests[1].tools.is_empty());
        assert!(requests[2].tools.is_empty());
    }

    #[tokio::test]
    async fn test_zero_rounds_still_answers() {
        let model = Arc::new(ScriptedChatModel::new(vec![tool_use(
            "c1",
            "search_course_content",
            json!({"query": "x"}),
        )]));
        let agent = Agent::new(model.clone(), "system").with_max_tool_rounds(0);
        let mut tools = course_tools().await;

        let response = agent.run("Anything", &[], &mut tools).await.unwrap();
        assert_eq!(response.content, FALLBACK_ANSWER);
        assert_eq!(response.rounds, 0);
        assert!(response.tool_calls.is_empty());
        assert!(model.requests()[0].tools.is_empty());
    }

    #[tokio::test]
    async fn test_multiple_calls_in_one_round_run_in_order() {
        let model = Arc::new(ScriptedChatModel::new(vec![
            ModelTurn::ToolUse {
                text: Some("Let me look.".to_string()),
                calls: vec![
                    ToolInvocation {
                        id: "a".to_string(),
                        name: "get_course_outline".to_string(),
                        arguments: json!({"course_title": "MCP"}),
                    },
                    ToolInvocation {
                        id: "b".to_string(),
                        name: "no_such_tool".to_string(),
                        arguments: json!({}),
                    },
                ],
            },
            ModelTurn::Answer("ok".to_string()),
        ]));
        let agent = Agent::new(model, "system");
        let mut tools = course_tools().await;

        let response = agent.run("Outline?", &[], &mut tools).await.unwrap();
        assert_eq!(response.rounds, 1);
        let names: Vec<_> = response.tool_calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["get_course_outline", "no_such_tool"]);
        assert_eq!(response.tool_calls[1].result, "Tool 'no_such_tool' not found");
    }

    #[tokio::test]
    async fn test_history_is_sent_before_query() {
        let model = Arc::new(ScriptedChatModel::new(vec![ModelTurn::Answer("Sure".to_string())]));
        let agent = Agent::new(model.clone(), "system");
        let mut tools = ToolManager::new();
        let history = vec![
            ConversationTurn::user("What is MCP?"),
            ConversationTurn::assistant("A protocol."),
        ];

        agent.run("Tell me more", &history, &mut tools).await.unwrap();

        let requests = model.requests();
        assert_eq!(
            requests[0].messages,
            vec![
                Message::User("What is MCP?".to_string()),
                Message::Assistant("A protocol.".to_string()),
                Message::User("Tell me more".to_string()),
            ]
        );
        assert!(requests[0].tools.is_empty());
    }

    #[tokio::test]
    async fn test_model_errors_propagate() {
        let model = Arc::new(ScriptedChatModel::new(Vec::new()));
        let agent = Agent::new(model, "system");
        let mut tools = ToolManager::new();

        let result = agent.run("Hi", &[], &mut tools).await;
        assert!(matches!(result, Err(LektorError::Agent(_))));
    }
}
