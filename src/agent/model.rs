//! Chat model abstraction and the OpenAI-backed implementation.
//!
//! The generation loop speaks in [`ChatRequest`] / [`ModelTurn`] so it can be
//! driven by any model that supports function calling.

use super::tools::ToolDefinition;
use crate::error::{LektorError, Result};
use crate::openai::create_client_with_timeout;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs, ChatCompletionTool,
    ChatCompletionToolChoiceOption, ChatCompletionToolType, CreateChatCompletionRequestArgs,
    FunctionCall, FunctionObject,
};
use async_openai::Client;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    /// Provider-assigned id, echoed back with the result.
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// One entry of the conversation sent to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    User(String),
    Assistant(String),
    /// An assistant turn that requested tools.
    AssistantToolCalls {
        text: Option<String>,
        calls: Vec<ToolInvocation>,
    },
    /// The output of one tool call.
    ToolResult { call_id: String, content: String },
}

/// A single completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub messages: Vec<Message>,
    /// Tools offered for this call. Empty means the model must answer in text.
    pub tools: Vec<ToolDefinition>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// What the model did with a request.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    /// A final text answer.
    Answer(String),
    /// A request to run one or more tools.
    ToolUse {
        text: Option<String>,
        calls: Vec<ToolInvocation>,
    },
}

/// Trait for chat models with function calling.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run one completion.
    async fn complete(&self, request: &ChatRequest) -> Result<ModelTurn>;
}

/// Chat model backed by the OpenAI chat completions API.
pub struct OpenAIChatModel {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAIChatModel {
    /// Create a chat model for the given model name.
    pub fn new(model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: create_client_with_timeout(timeout)?,
            model: model.to_string(),
        })
    }

    fn build_messages(request: &ChatRequest) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(request.system.clone())
                .build()
                .map_err(|e| LektorError::Agent(e.to_string()))?
                .into(),
        ];

        for message in &request.messages {
            let converted: ChatCompletionRequestMessage = match message {
                Message::User(text) => ChatCompletionRequestUserMessageArgs::default()
                    .content(text.clone())
                    .build()
                    .map_err(|e| LektorError::Agent(e.to_string()))?
                    .into(),
                Message::Assistant(text) => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(text.clone())
                    .build()
                    .map_err(|e| LektorError::Agent(e.to_string()))?
                    .into(),
                Message::AssistantToolCalls { text, calls } => {
                    let tool_calls = calls
                        .iter()
                        .map(|call| -> Result<ChatCompletionMessageToolCall> {
                            Ok(ChatCompletionMessageToolCall {
                                id: call.id.clone(),
                                r#type: ChatCompletionToolType::Function,
                                function: FunctionCall {
                                    name: call.name.clone(),
                                    arguments: serde_json::to_string(&call.arguments)?,
                                },
                            })
                        })
                        .collect::<Result<Vec<_>>>()?;

                    let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                    args.tool_calls(tool_calls);
                    if let Some(text) = text {
                        args.content(text.clone());
                    }
                    args.build()
                        .map_err(|e| LektorError::Agent(e.to_string()))?
                        .into()
                }
                Message::ToolResult { call_id, content } => {
                    ChatCompletionRequestToolMessageArgs::default()
                        .tool_call_id(call_id.clone())
                        .content(content.clone())
                        .build()
                        .map_err(|e| LektorError::Agent(e.to_string()))?
                        .into()
                }
            };
            messages.push(converted);
        }

        Ok(messages)
    }
}

fn to_openai_tool(definition: &ToolDefinition) -> ChatCompletionTool {
    ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: FunctionObject {
            name: definition.name.clone(),
            description: Some(definition.description.clone()),
            parameters: Some(definition.input_schema.clone()),
            strict: None,
        },
    }
}

/// Parse tool arguments, keeping malformed JSON as a raw string so the tool
/// can report it.
fn parse_arguments(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    async fn complete(&self, request: &ChatRequest) -> Result<ModelTurn> {
        let messages = Self::build_messages(request)?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .messages(messages)
            .max_completion_tokens(request.max_tokens)
            .temperature(request.temperature);

        if !request.tools.is_empty() {
            builder
                .tools(request.tools.iter().map(to_openai_tool).collect::<Vec<_>>())
                .tool_choice(ChatCompletionToolChoiceOption::Auto);
        }

        let api_request = builder
            .build()
            .map_err(|e| LektorError::Agent(e.to_string()))?;

        debug!(
            "Chat completion: {} messages, {} tools",
            request.messages.len() + 1,
            request.tools.len()
        );

        let response = self
            .client
            .chat()
            .create(api_request)
            .await
            .map_err(|e| LektorError::OpenAI(format!("Chat API error: {}", e)))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LektorError::Agent("No response from model".to_string()))?;

        let text = choice.message.content.filter(|t| !t.is_empty());

        match choice.message.tool_calls {
            Some(tool_calls) if !tool_calls.is_empty() => {
                let calls = tool_calls
                    .into_iter()
                    .map(|call| ToolInvocation {
                        id: call.id,
                        arguments: parse_arguments(&call.function.arguments),
                        name: call.function.name,
                    })
                    .collect();
                Ok(ModelTurn::ToolUse { text, calls })
            }
            _ => Ok(ModelTurn::Answer(text.unwrap_or_default())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(messages: Vec<Message>) -> ChatRequest {
        ChatRequest {
            system: "system".to_string(),
            messages,
            tools: Vec::new(),
            max_tokens: 100,
            temperature: 0.0,
        }
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(parse_arguments(r#"{"query": "x"}"#), json!({"query": "x"}));
        assert_eq!(parse_arguments("not json"), Value::String("not json".to_string()));
    }

    #[test]
    fn test_build_messages_with_tool_round() {
        let messages = OpenAIChatModel::build_messages(&request(vec![
            Message::User("What is MCP?".to_string()),
            Message::AssistantToolCalls {
                text: None,
                calls: vec![ToolInvocation {
                    id: "call_1".to_string(),
                    name: "search_course_content".to_string(),
                    arguments: json!({"query": "MCP"}),
                }],
            },
            Message::ToolResult {
                call_id: "call_1".to_string(),
                content: "[Introduction to MCP]\nMCP is a protocol".to_string(),
            },
        ]))
        .unwrap();

        assert_eq!(messages.len(), 4);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::User(_)));
        match &messages[2] {
            ChatCompletionRequestMessage::Assistant(msg) => {
                let calls = msg.tool_calls.as_ref().unwrap();
                assert_eq!(calls[0].id, "call_1");
                assert_eq!(calls[0].function.name, "search_course_content");
            }
            other => panic!("Expected assistant message, got {:?}", other),
        }
        match &messages[3] {
            ChatCompletionRequestMessage::Tool(msg) => assert_eq!(msg.tool_call_id, "call_1"),
            other => panic!("Expected tool message, got {:?}", other),
        }
    }

    #[test]
    fn test_to_openai_tool() {
        let tool = to_openai_tool(&ToolDefinition {
            name: "get_course_outline".to_string(),
            description: "Outline".to_string(),
            input_schema: json!({"type": "object"}),
        });
        assert_eq!(tool.function.name, "get_course_outline");
        assert_eq!(tool.function.parameters, Some(json!({"type": "object"})));
    }
}
