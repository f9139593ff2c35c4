//! Anthropic Messages API adapter.

use super::{
    ChatModel, CompletionRequest, Message, ModelResponse, ToolChoice, ToolDefinition,
};
use crate::config::ModelSettings;
use crate::error::{Result, SyllabusError};
use crate::openai::http_client;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_API_BASE: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

/// Chat model backed by the Anthropic Messages API.
pub struct AnthropicModel {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl AnthropicModel {
    /// Create a model client with default generation parameters.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: http_client(Duration::from_secs(crate::openai::DEFAULT_TIMEOUT_SECS))?,
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            model: model.into(),
            max_tokens: 800,
            temperature: 0.0,
        })
    }

    /// Build from settings, reading the key from `ANTHROPIC_API_KEY`.
    pub fn from_settings(settings: &ModelSettings) -> Result<Self> {
        let key_var = settings.provider.api_key_env();
        let api_key = std::env::var(key_var)
            .map_err(|_| SyllabusError::Config(format!("{} is not set", key_var)))?;

        let mut model = Self::new(api_key, &settings.model)?
            .with_max_tokens(settings.max_tokens)
            .with_temperature(settings.temperature);
        model.client = http_client(Duration::from_secs(settings.timeout_secs))?;
        if let Some(base) = &settings.api_base {
            model = model.with_api_base(base);
        }
        Ok(model)
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    fn body<'a>(&'a self, request: &'a CompletionRequest) -> MessagesRequest<'a> {
        let tools = request.tools.as_deref();
        MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: &request.system,
            messages: &request.messages,
            tools,
            tool_choice: tools.and(request.tool_choice),
        }
    }
}

#[async_trait]
impl ChatModel for AnthropicModel {
    #[instrument(skip(self, request), fields(model = %self.model, messages = request.messages.len()))]
    async fn complete(&self, request: &CompletionRequest) -> Result<ModelResponse> {
        let response = self
            .client
            .post(format!("{}/v1/messages", self.api_base))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&self.body(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyllabusError::Model(format!(
                "Anthropic API returned {}: {}",
                status, body
            )));
        }

        let parsed: ModelResponse = response
            .json()
            .await
            .map_err(|e| SyllabusError::Model(format!("Failed to decode response: {}", e)))?;

        debug!(
            "Response with {} blocks, stop reason {:?}",
            parsed.content.len(),
            parsed.stop_reason
        );
        Ok(parsed)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
