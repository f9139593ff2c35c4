//! Course tools offered to the model.

use super::registry::{Tool, ToolOutput};
use crate::catalog::Course;
use crate::llm::ToolDefinition;
use crate::rag::{relevance_score, RetrievalGateway, SearchResults, Source};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{instrument, warn};

pub const SEARCH_TOOL_NAME: &str = "search_course_content";
pub const OUTLINE_TOOL_NAME: &str = "get_course_outline";

fn parse_args<T: DeserializeOwned>(tool: &str, input: &Value) -> Result<T, String> {
    serde_json::from_value(input.clone())
        .map_err(|e| format!("Invalid arguments for tool '{}': {}", tool, e))
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    course_name: Option<String>,
    #[serde(default)]
    lesson_number: Option<u32>,
}

/// Content search over the catalog, with optional course and lesson filters.
pub struct CourseSearchTool {
    gateway: Arc<RetrievalGateway>,
}

impl CourseSearchTool {
    pub fn new(gateway: Arc<RetrievalGateway>) -> Self {
        Self { gateway }
    }

    /// Turn result rows into model text and citations.
    async fn format_results(&self, results: &SearchResults) -> ToolOutput {
        let mut courses: HashMap<String, Option<Course>> = HashMap::new();
        let mut blocks = Vec::with_capacity(results.len());
        let mut sources = Vec::with_capacity(results.len());

        for hit in results.hits() {
            let title = &hit.metadata.course_title;
            let lesson = hit.metadata.lesson_number;

            let header = match lesson {
                Some(n) => format!("[{} - Lesson {}]", title, n),
                None => format!("[{}]", title),
            };
            blocks.push(format!("{}\n{}", header, hit.document));

            if !courses.contains_key(title) {
                let course = self.gateway.course(title).await.unwrap_or_else(|e| {
                    warn!("Course lookup for '{}' failed: {}", title, e);
                    None
                });
                courses.insert(title.clone(), course);
            }
            let link = courses.get(title).and_then(|c| c.as_ref()).and_then(|c| {
                lesson
                    .and_then(|n| c.lesson_link(n))
                    .or(c.course_link.as_deref())
                    .map(str::to_string)
            });

            sources.push(Source::new(title, lesson, link, relevance_score(hit.distance)));
        }

        ToolOutput::with_sources(blocks.join("\n\n"), sources)
    }
}

fn no_content_message(course_name: Option<&str>, lesson_number: Option<u32>) -> String {
    let mut message = "No relevant content found".to_string();
    if let Some(name) = course_name {
        message.push_str(&format!(" in course '{}'", name));
    }
    if let Some(n) = lesson_number {
        message.push_str(&format!(" in lesson {}", n));
    }
    message
}

#[async_trait]
impl Tool for CourseSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: SEARCH_TOOL_NAME.to_string(),
            description: "Search course materials with smart course name matching and lesson filtering"
                .to_string(),
            input_schema: json!({
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

    #[instrument(skip(self, input), name = "search_course_content")]
    async fn execute(&self, input: &Value) -> ToolOutput {
        let args: SearchArgs = match parse_args(SEARCH_TOOL_NAME, input) {
            Ok(args) => args,
            Err(message) => return ToolOutput::text(message),
        };
        let course_name = args.course_name.as_deref().filter(|n| !n.is_empty());

        let results = self
            .gateway
            .search(&args.query, course_name, args.lesson_number, None)
            .await;

        if let Some(error) = results.error() {
            return ToolOutput::text(error);
        }
        if results.is_empty() {
            return ToolOutput::text(no_content_message(course_name, args.lesson_number));
        }

        self.format_results(&results).await
    }
}

#[derive(Debug, Deserialize)]
struct OutlineArgs {
    course_title: String,
}

/// Course outline lookup: title, link and ordered lessons.
pub struct CourseOutlineTool {
    gateway: Arc<RetrievalGateway>,
}

impl CourseOutlineTool {
    pub fn new(gateway: Arc<RetrievalGateway>) -> Self {
        Self { gateway }
    }
}

/// Render a course as an outline.
pub fn format_outline(course: &Course) -> String {
    let mut outline = format!(
        "Course Title: {}\nCourse Link: {}\nLessons:\n",
        course.title,
        course.course_link.as_deref().unwrap_or("N/A")
    );
    let lines: Vec<String> = course
        .sorted_lessons()
        .iter()
        .map(|l| format!("  Lesson {}: {}", l.lesson_number, l.title))
        .collect();
    outline.push_str(&lines.join("\n"));
    outline
}

#[async_trait]
impl Tool for CourseOutlineTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: OUTLINE_TOOL_NAME.to_string(),
            description: "Get a course outline with its title, link and complete lesson list"
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "course_title": {
                        "type": "string",
                        "description": "Course title (partial matches work)"
                    }
                },
                "required": ["course_title"]
            }),
        }
    }

    #[instrument(skip(self, input), name = "get_course_outline")]
    async fn execute(&self, input: &Value) -> ToolOutput {
        let args: OutlineArgs = match parse_args(OUTLINE_TOOL_NAME, input) {
            Ok(args) => args,
            Err(message) => return ToolOutput::text(message),
        };

        match self.gateway.resolve_course(&args.course_title).await {
            Ok(Some(found)) => {
                let source = Source::new(
                    &found.course.title,
                    None,
                    found.course.course_link.clone(),
                    relevance_score(found.distance),
                );
                ToolOutput::with_sources(format_outline(&found.course), vec![source])
            }
            Ok(None) => ToolOutput::text(format!(
                "No course found matching '{}'",
                args.course_title
            )),
            Err(e) => ToolOutput::text(format!("Search error: {}", e)),
        }
    }
}
