//! Language model capability.
//!
//! Messages are modelled as ordered lists of content blocks (text, tool use,
//! tool result). Providers translate to and from their own wire formats.

mod anthropic;
mod openai;

pub use anthropic::AnthropicModel;
pub use openai::OpenAIModel;

use crate::config::{ModelProvider, ModelSettings};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One block of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
    /// Any block type this crate does not understand.
    #[serde(other)]
    Unknown,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// A conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Echo of an assistant response. Unknown blocks are dropped.
    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content: content
                .into_iter()
                .filter(|b| !matches!(b, ContentBlock::Unknown))
                .collect(),
        }
    }

    /// Concatenated text blocks.
    pub fn text(&self) -> String {
        joined_text(&self.content)
    }

    /// A user turn carrying tool results, in request order.
    pub fn tool_results(results: Vec<(String, String)>) -> Self {
        Self {
            role: Role::User,
            content: results
                .into_iter()
                .map(|(tool_use_id, content)| ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                })
                .collect(),
        }
    }
}

/// Schema of an invocable tool, as offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// How the model may choose tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolChoice {
    Auto,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    #[serde(other)]
    Other,
}

/// A single completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<Message>,
    /// `None` disables tool use for this call.
    pub tools: Option<Vec<ToolDefinition>>,
    pub tool_choice: Option<ToolChoice>,
}

/// Raw model response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelResponse {
    #[serde(default)]
    pub stop_reason: Option<StopReason>,
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

/// Classified model response.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Final answer text.
    Final(String),
    /// Tool requests, with the full response content to echo back.
    ToolCalls {
        content: Vec<ContentBlock>,
        calls: Vec<ToolCall>,
    },
    /// Unrecognized shape; carries whatever text was present.
    Other(String),
}

impl ModelResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            stop_reason: Some(StopReason::EndTurn),
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Concatenated text blocks.
    pub fn joined_text(&self) -> String {
        joined_text(&self.content)
    }

    fn has_text(&self) -> bool {
        self.content
            .iter()
            .any(|b| matches!(b, ContentBlock::Text { .. }))
    }

    pub fn into_reply(self) -> Reply {
        let calls: Vec<ToolCall> = self
            .content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, name, input } => Some(ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                }),
                _ => None,
            })
            .collect();

        if self.stop_reason == Some(StopReason::ToolUse) && !calls.is_empty() {
            return Reply::ToolCalls {
                content: self.content,
                calls,
            };
        }

        if self.has_text() {
            Reply::Final(self.joined_text())
        } else {
            Reply::Other(self.joined_text())
        }
    }
}

fn joined_text(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .filter_map(|b| match b {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

/// Trait for chat model providers.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run one completion.
    async fn complete(&self, request: &CompletionRequest) -> Result<ModelResponse>;

    /// Model identifier, for logging.
    fn name(&self) -> &str;
}

/// Build the configured model provider.
pub fn create_model(settings: &ModelSettings) -> Result<Arc<dyn ChatModel>> {
    let model: Arc<dyn ChatModel> = match settings.provider {
        ModelProvider::Anthropic => Arc::new(AnthropicModel::from_settings(settings)?),
        ModelProvider::OpenAI => Arc::new(OpenAIModel::from_settings(settings)?),
    };
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_tool_use_response() {
        let raw = json!({
            "id": "msg_1",
            "stop_reason": "tool_use",
            "content": [
                {"type": "text", "text": "Let me search."},
                {"type": "tool_use", "id": "t1", "name": "search_course_content", "input": {"query": "loops"}}
            ]
        });
        let response: ModelResponse = serde_json::from_value(raw).unwrap();

        match response.into_reply() {
            Reply::ToolCalls { content, calls } => {
                assert_eq!(content.len(), 2);
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].name, "search_course_content");
                assert_eq!(calls[0].input["query"], "loops");
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_blocks_and_reasons_decode() {
        let raw = json!({
            "stop_reason": "pause_turn",
            "content": [{"type": "thinking", "thinking": "..."}]
        });
        let response: ModelResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(response.stop_reason, Some(StopReason::Other));
        assert_eq!(response.content, vec![ContentBlock::Unknown]);
        assert_eq!(response.into_reply(), Reply::Other(String::new()));
    }

    #[test]
    fn test_text_reply_concatenates_blocks() {
        let response = ModelResponse {
            stop_reason: Some(StopReason::EndTurn),
            content: vec![ContentBlock::text("Hello "), ContentBlock::text("world")],
        };
        assert_eq!(response.into_reply(), Reply::Final("Hello world".to_string()));
    }

    #[test]
    fn test_tool_use_without_tool_stop_reason_is_final() {
        let response = ModelResponse {
            stop_reason: Some(StopReason::EndTurn),
            content: vec![
                ContentBlock::text("Answer"),
                ContentBlock::ToolUse {
                    id: "t1".to_string(),
                    name: "search_course_content".to_string(),
                    input: json!({}),
                },
            ],
        };
        assert_eq!(response.into_reply(), Reply::Final("Answer".to_string()));
    }

    #[test]
    fn test_message_serialization() {
        let msg = Message::tool_results(vec![("t1".to_string(), "result".to_string())]);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "role": "user",
                "content": [{"type": "tool_result", "tool_use_id": "t1", "content": "result"}]
            })
        );

        let assistant = Message::assistant(vec![ContentBlock::Unknown, ContentBlock::text("x")]);
        assert_eq!(assistant.content, vec![ContentBlock::text("x")]);

        assert_eq!(serde_json::to_value(ToolChoice::Auto).unwrap(), json!({"type": "auto"}));
    }
}
