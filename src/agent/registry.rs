//! Tool registry: name-based dispatch and citation tracking.

use crate::error::{Result, SyllabusError};
use crate::llm::ToolDefinition;
use crate::rag::Source;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// What a tool invocation produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    /// Text fed back to the model.
    pub text: String,
    /// Citations for the content in `text`.
    pub sources: Vec<Source>,
}

impl ToolOutput {
    /// Output with no citations (errors, empty results).
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sources: Vec::new(),
        }
    }

    pub fn with_sources(text: impl Into<String>, sources: Vec<Source>) -> Self {
        Self {
            text: text.into(),
            sources,
        }
    }
}

/// An operation the model can invoke.
///
/// Tools never fail: every problem is reported in the output text.
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn execute(&self, input: &Value) -> ToolOutput;
}

/// Registered tools for one query.
///
/// Holds the sources of the most recent invocation that produced any, so a
/// registry should not be shared between concurrent queries.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<String, usize>,
    last_sources: Vec<Source>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Names must be unique; a duplicate is rejected and
    /// the first registration stays.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.definition().name;
        if self.by_name.contains_key(&name) {
            return Err(SyllabusError::DuplicateTool(name));
        }
        self.by_name.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Tool schemas in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run a tool by name. Unknown names yield an explanatory text.
    pub async fn invoke(&mut self, name: &str, input: &Value) -> String {
        let Some(&index) = self.by_name.get(name) else {
            info!("Model requested unknown tool '{}'", name);
            return format!("Tool '{}' not found", name);
        };

        let output = self.tools[index].execute(input).await;
        debug!(
            "Tool '{}' returned {} chars, {} sources",
            name,
            output.text.len(),
            output.sources.len()
        );

        if !output.sources.is_empty() {
            self.last_sources = output.sources;
        }
        output.text
    }

    /// Sources from the most recent invocation that produced any.
    pub fn last_sources(&self) -> &[Source] {
        &self.last_sources
    }

    pub fn reset_sources(&mut self) {
        self.last_sources.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool {
        name: &'static str,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: self.name.to_string(),
                description: "Echo the input".to_string(),
                input_schema: json!({"type": "object", "properties": {}, "required": []}),
            }
        }

        async fn execute(&self, input: &Value) -> ToolOutput {
            let text = input["text"].as_str().unwrap_or_default().to_string();
            if text.is_empty() {
                return ToolOutput::text("nothing to echo");
            }
            ToolOutput::with_sources(
                text.clone(),
                vec![Source::new(&text, None, None, 100)],
            )
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool { name: "first" })).unwrap();
        registry.register(Arc::new(EchoTool { name: "second" })).unwrap();
        registry
    }

    #[test]
    fn test_definitions_in_registration_order() {
        let names: Vec<String> = registry().definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = registry();
        let err = registry
            .register(Arc::new(EchoTool { name: "first" }))
            .unwrap_err();
        assert!(matches!(err, SyllabusError::DuplicateTool(ref n) if n == "first"));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let mut registry = registry();
        let text = registry.invoke("nonexistent_tool", &json!({})).await;
        assert_eq!(text, "Tool 'nonexistent_tool' not found");
        assert!(registry.last_sources().is_empty());
    }

    #[tokio::test]
    async fn test_last_sources_follow_latest_tool() {
        let mut registry = registry();

        assert_eq!(registry.invoke("first", &json!({"text": "a"})).await, "a");
        assert_eq!(registry.last_sources()[0].text, "a");

        registry.invoke("second", &json!({"text": "b"})).await;
        assert_eq!(registry.last_sources().len(), 1);
        assert_eq!(registry.last_sources()[0].text, "b");

        // An invocation without citations keeps the previous ones.
        registry.invoke("first", &json!({})).await;
        assert_eq!(registry.last_sources()[0].text, "b");

        registry.reset_sources();
        assert!(registry.last_sources().is_empty());
    }
}
