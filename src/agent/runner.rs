//! Bounded tool-calling loop between the model and the tool registry.

use super::registry::ToolRegistry;
use crate::error::Result;
use crate::llm::{ChatModel, CompletionRequest, Message, Reply, ToolChoice};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Default number of tool-bearing rounds before a final answer is forced.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 2;

const DEFAULT_HISTORY_TEMPLATE: &str = "Previous conversation:\n{{history}}";

/// Drives one query through the model, executing requested tools.
///
/// Each response is either a final answer or a round of tool requests. A
/// round executes every requested tool in order and feeds the results back.
/// After `max_tool_rounds` rounds, one more call is made without tools so
/// the model has to answer in text.
pub struct Orchestrator {
    model: Arc<dyn ChatModel>,
    system_prompt: String,
    history_template: String,
    max_tool_rounds: usize,
}

impl Orchestrator {
    pub fn new(model: Arc<dyn ChatModel>, system_prompt: impl Into<String>) -> Self {
        Self {
            model,
            system_prompt: system_prompt.into(),
            history_template: DEFAULT_HISTORY_TEMPLATE.to_string(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    /// Set the tool round bound.
    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    /// Template for the history section; `{{history}}` is replaced with
    /// the formatted conversation.
    pub fn with_history_template(mut self, template: impl Into<String>) -> Self {
        self.history_template = template.into();
        self
    }

    fn system_for(&self, history: Option<&str>) -> String {
        match history.filter(|h| !h.is_empty()) {
            Some(h) => format!(
                "{}\n\n{}",
                self.system_prompt,
                self.history_template.replace("{{history}}", h)
            ),
            None => self.system_prompt.clone(),
        }
    }

    /// Answer a query, returning only the final text.
    pub async fn generate_response(
        &self,
        query: &str,
        history: Option<&str>,
        tools: Option<&mut ToolRegistry>,
    ) -> Result<String> {
        Ok(self.run(query, history, tools).await?.content)
    }

    /// Answer a query, reporting the tool calls made along the way.
    #[instrument(skip(self, query, history, tools), fields(model = self.model.name()))]
    pub async fn run(
        &self,
        query: &str,
        history: Option<&str>,
        mut tools: Option<&mut ToolRegistry>,
    ) -> Result<AgentResponse> {
        let system = self.system_for(history);
        let definitions = tools.as_deref().map(|r| r.definitions());

        let mut messages = vec![Message::user(query)];
        let mut records = Vec::new();
        let mut rounds = 0;
        let mut model_calls = 0;

        loop {
            let request = CompletionRequest {
                system: system.clone(),
                messages: messages.clone(),
                tools: definitions.clone(),
                tool_choice: definitions.as_ref().map(|_| ToolChoice::Auto),
            };

            model_calls += 1;
            debug!("Model call {} (round {})", model_calls, rounds);
            let reply = self.model.complete(&request).await?.into_reply();

            let (content, calls) = match reply {
                Reply::Final(text) => {
                    return Ok(AgentResponse::new(text, records, model_calls, rounds, false));
                }
                Reply::Other(text) => {
                    warn!("Unrecognized response shape; using its text as the answer");
                    return Ok(AgentResponse::new(text, records, model_calls, rounds, false));
                }
                Reply::ToolCalls { content, calls } => (content, calls),
            };

            let Some(registry) = tools.as_deref_mut() else {
                warn!("Tool use requested but no tools were offered");
                let text = Message::assistant(content).text();
                return Ok(AgentResponse::new(text, records, model_calls, rounds, false));
            };

            if rounds >= self.max_tool_rounds {
                warn!(
                    "Reached {} tool rounds; forcing a final answer",
                    self.max_tool_rounds
                );
                let text = self.forced_final(&system, &messages).await?;
                model_calls += 1;
                return Ok(AgentResponse::new(text, records, model_calls, rounds, true));
            }

            rounds += 1;
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                info!("Calling tool {} with {}", call.name, call.input);
                let output = registry.invoke(&call.name, &call.input).await;
                records.push(ToolCallRecord {
                    name: call.name,
                    arguments: call.input.to_string(),
                    result: output.clone(),
                });
                results.push((call.id, output));
            }

            messages.push(Message::assistant(content));
            messages.push(Message::tool_results(results));
        }
    }

    /// Final call with no tools offered. Any tool request in the reply is
    /// ignored and its text kept.
    async fn forced_final(&self, system: &str, messages: &[Message]) -> Result<String> {
        let request = CompletionRequest {
            system: system.to_string(),
            messages: messages.to_vec(),
            tools: None,
            tool_choice: None,
        };
        let response = self.model.complete(&request).await?;
        Ok(response.joined_text())
    }
}

/// Response from an orchestrator run.
#[derive(Debug)]
pub struct AgentResponse {
    /// The final answer text.
    pub content: String,
    /// Every tool call executed, in order.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Number of model calls made.
    pub model_calls: usize,
    /// Tool rounds executed.
    pub rounds: usize,
    /// Whether the round bound forced the answer.
    pub forced_final: bool,
}

impl AgentResponse {
    fn new(
        content: String,
        tool_calls: Vec<ToolCallRecord>,
        model_calls: usize,
        rounds: usize,
        forced_final: bool,
    ) -> Self {
        Self {
            content,
            tool_calls,
            model_calls,
            rounds,
            forced_final,
        }
    }
}

/// Record of a tool call made during a run.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    /// Name of the tool called.
    pub name: String,
    /// JSON arguments passed to the tool.
    pub arguments: String,
    /// Text returned to the model.
    pub result: String,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}
