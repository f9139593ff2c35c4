//! Prompt templates for Syllabus.
//!
//! Prompts can be customized by placing an `assistant.toml` file in the
//! custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Prompts {
    pub assistant: AssistantPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts for the course assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantPrompts {
    pub system: String,
    /// Wraps the user's question. Variables: `{{query}}`.
    pub query: String,
    /// Appended to the system prompt when a session has history.
    /// Variables: `{{history}}`.
    pub history: String,
}

impl Default for AssistantPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an AI assistant specialized in course materials and educational content, with access to tools for course information.

Tool usage:
- Use `search_course_content` for questions about specific course content or detailed educational material
- Use `get_course_outline` for questions about a course's structure, its link, or its list of lessons
- You may use up to two tool calls per query, one after the other, when the first result is not enough
- Synthesize tool results into accurate, fact-based responses
- If a tool yields no results, state this clearly without offering alternatives

Response protocol:
- General knowledge questions: answer using existing knowledge without using tools
- Course-specific questions: use the tools first, then answer
- For outline questions, return the course title, course link, and every lesson with its number and title
- No meta-commentary: do not explain your search process or mention the tools in the answer

All responses must be:
1. Brief, concise and focused
2. Educational, maintaining instructional value
3. Clear, using accessible language
4. Example-supported where it aids understanding

Provide only the direct answer to what was asked."#
                .to_string(),

            query: "Answer this question about course materials: {{query}}".to_string(),

            history: "Previous conversation:\n{{history}}".to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let assistant_path = custom_path.join("assistant.toml");
            if assistant_path.exists() {
                let content = std::fs::read_to_string(&assistant_path)?;
                prompts.assistant = toml::from_str(&content)?;
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

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }

    /// The system prompt with config variables applied.
    pub fn system_prompt(&self) -> String {
        self.render_with_custom(&self.assistant.system, &HashMap::new())
    }

    /// Wrap a user question in the query template.
    pub fn query_prompt(&self, query: &str) -> String {
        let vars = HashMap::from([("query".to_string(), query.to_string())]);
        self.render_with_custom(&self.assistant.query, &vars)
    }

    /// Format the conversation-history section of the system prompt.
    pub fn history_section(&self, history: &str) -> String {
        let vars = HashMap::from([("history".to_string(), history.to_string())]);
        self.render_with_custom(&self.assistant.history, &vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        let system = prompts.system_prompt();
        assert!(system.to_lowercase().contains("course materials"));
        assert!(system.contains("search_course_content"));
        assert!(system.contains("get_course_outline"));
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }

    #[test]
    fn test_query_and_history_templates() {
        let prompts = Prompts::default();
        assert_eq!(
            prompts.query_prompt("What is Python?"),
            "Answer this question about course materials: What is Python?"
        );
        assert_eq!(
            prompts.history_section("User: hi\nAssistant: hello"),
            "Previous conversation:\nUser: hi\nAssistant: hello"
        );
    }

    #[test]
    fn test_custom_dir_overrides() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("assistant.toml"),
            "system = \"You help {{audience}} with courses.\"\n",
        )
        .unwrap();

        let vars = HashMap::from([("audience".to_string(), "students".to_string())]);
        let prompts = Prompts::load(dir.path().to_str(), Some(&vars)).unwrap();

        assert_eq!(prompts.system_prompt(), "You help students with courses.");
        // Fields missing from the file keep their defaults.
        assert!(prompts.assistant.query.contains("{{query}}"));
    }
}
