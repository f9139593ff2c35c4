//! OpenAI chat completions adapter.

use super::{ChatModel, CompletionRequest, ContentBlock, Message, ModelResponse, Role, StopReason};
use crate::config::ModelSettings;
use crate::error::{Result, SyllabusError};
use crate::openai::create_client_with_timeout;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolChoiceOption,
    ChatCompletionToolType, CreateChatCompletionRequestArgs, FinishReason, FunctionCall,
    FunctionObjectArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

/// Chat model backed by OpenAI chat completions.
pub struct OpenAIModel {
    client: Client<OpenAIConfig>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

fn api_err(e: impl std::fmt::Display) -> SyllabusError {
    SyllabusError::OpenAI(e.to_string())
}

impl OpenAIModel {
    /// Build from settings. The key is read from `OPENAI_API_KEY` by the client.
    pub fn from_settings(settings: &ModelSettings) -> Result<Self> {
        let client = create_client_with_timeout(
            Duration::from_secs(settings.timeout_secs),
            settings.api_base.as_deref(),
        )?;

        Ok(Self {
            client,
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        })
    }

    fn convert_tools(request: &CompletionRequest) -> Result<Option<Vec<ChatCompletionTool>>> {
        let Some(tools) = &request.tools else {
            return Ok(None);
        };

        tools
            .iter()
            .map(|t| {
                let function = FunctionObjectArgs::default()
                    .name(&t.name)
                    .description(&t.description)
                    .parameters(t.input_schema.clone())
                    .build()
                    .map_err(api_err)?;
                ChatCompletionToolArgs::default()
                    .r#type(ChatCompletionToolType::Function)
                    .function(function)
                    .build()
                    .map_err(api_err)
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    /// Translate block-structured turns into chat messages. Tool results
    /// become `tool` role messages, one per result, in order.
    fn convert_messages(request: &CompletionRequest) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut out: Vec<ChatCompletionRequestMessage> = Vec::new();

        if !request.system.is_empty() {
            out.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(request.system.clone())
                    .build()
                    .map_err(api_err)?
                    .into(),
            );
        }

        for message in &request.messages {
            out.extend(Self::convert_message(message)?);
        }

        Ok(out)
    }

    fn convert_message(message: &Message) -> Result<Vec<ChatCompletionRequestMessage>> {
        let text: String = message
            .content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();

        let mut out: Vec<ChatCompletionRequestMessage> = Vec::new();

        match message.role {
            Role::Assistant => {
                let tool_calls: Vec<ChatCompletionMessageToolCall> = message
                    .content
                    .iter()
                    .filter_map(|b| match b {
                        ContentBlock::ToolUse { id, name, input } => {
                            Some(ChatCompletionMessageToolCall {
                                id: id.clone(),
                                r#type: ChatCompletionToolType::Function,
                                function: FunctionCall {
                                    name: name.clone(),
                                    arguments: input.to_string(),
                                },
                            })
                        }
                        _ => None,
                    })
                    .collect();

                let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                if !text.is_empty() {
                    args.content(text);
                }
                if !tool_calls.is_empty() {
                    args.tool_calls(tool_calls);
                }
                out.push(args.build().map_err(api_err)?.into());
            }
            Role::User => {
                for block in &message.content {
                    if let ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                    } = block
                    {
                        out.push(
                            ChatCompletionRequestToolMessageArgs::default()
                                .tool_call_id(tool_use_id.clone())
                                .content(content.clone())
                                .build()
                                .map_err(api_err)?
                                .into(),
                        );
                    }
                }
                if !text.is_empty() {
                    out.push(
                        ChatCompletionRequestUserMessageArgs::default()
                            .content(text)
                            .build()
                            .map_err(api_err)?
                            .into(),
                    );
                }
            }
        }

        Ok(out)
    }
}

#[async_trait]
impl ChatModel for OpenAIModel {
    #[instrument(skip(self, request), fields(model = %self.model, messages = request.messages.len()))]
    async fn complete(&self, request: &CompletionRequest) -> Result<ModelResponse> {
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .messages(Self::convert_messages(request)?)
            .max_completion_tokens(self.max_tokens)
            .temperature(self.temperature);

        if let Some(tools) = Self::convert_tools(request)? {
            builder.tools(tools);
            if request.tool_choice.is_some() {
                builder.tool_choice(ChatCompletionToolChoiceOption::Auto);
            }
        }

        let response = self
            .client
            .chat()
            .create(builder.build().map_err(api_err)?)
            .await
            .map_err(|e| SyllabusError::OpenAI(format!("Chat API error: {}", e)))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| SyllabusError::Model("No response from model".to_string()))?;

        let mut content = Vec::new();
        if let Some(text) = choice.message.content.filter(|t| !t.is_empty()) {
            content.push(ContentBlock::Text { text });
        }
        for call in choice.message.tool_calls.unwrap_or_default() {
            let input = serde_json::from_str(&call.function.arguments)
                .unwrap_or(Value::String(call.function.arguments));
            content.push(ContentBlock::ToolUse {
                id: call.id,
                name: call.function.name,
                input,
            });
        }

        let stop_reason = choice.finish_reason.map(|r| match r {
            FinishReason::Stop => StopReason::EndTurn,
            FinishReason::ToolCalls => StopReason::ToolUse,
            FinishReason::Length => StopReason::MaxTokens,
            _ => StopReason::Other,
        });

        debug!("Response with {} blocks, stop reason {:?}", content.len(), stop_reason);
        Ok(ModelResponse {
            stop_reason,
            content,
        })
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_turns_convert_to_chat_messages() {
        let request = CompletionRequest {
            system: "sys".to_string(),
            messages: vec![
                Message::user("What is in lesson 1?"),
                Message::assistant(vec![ContentBlock::ToolUse {
                    id: "call_1".to_string(),
                    name: "search_course_content".to_string(),
                    input: json!({"query": "lesson 1"}),
                }]),
                Message::tool_results(vec![("call_1".to_string(), "found".to_string())]),
            ],
            tools: None,
            tool_choice: None,
        };

        let messages = OpenAIModel::convert_messages(&request).unwrap();
        assert_eq!(messages.len(), 4);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::User(_)));
        match &messages[2] {
            ChatCompletionRequestMessage::Assistant(a) => {
                let calls = a.tool_calls.as_ref().unwrap();
                assert_eq!(calls[0].function.name, "search_course_content");
            }
            other => panic!("unexpected message: {:?}", other),
        }
        match &messages[3] {
            ChatCompletionRequestMessage::Tool(t) => assert_eq!(t.tool_call_id, "call_1"),
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
