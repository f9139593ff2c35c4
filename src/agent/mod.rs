//! Tool-calling agent for course questions.
//!
//! The [`Orchestrator`] runs a bounded loop in which the model may search
//! course content or fetch a course outline before answering. Tools are
//! dispatched by name through a per-query [`ToolRegistry`].

mod registry;
mod runner;
mod tools;

pub use registry::{Tool, ToolOutput, ToolRegistry};
pub use runner::{AgentResponse, Orchestrator, ToolCallRecord, DEFAULT_MAX_TOOL_ROUNDS};
pub use tools::{
    format_outline, CourseOutlineTool, CourseSearchTool, OUTLINE_TOOL_NAME, SEARCH_TOOL_NAME,
};

use crate::error::Result;
use crate::rag::RetrievalGateway;
use std::sync::Arc;

/// A registry with the search and outline tools over one gateway.
pub fn course_tools(gateway: Arc<RetrievalGateway>) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(CourseSearchTool::new(gateway.clone())))?;
    registry.register(Arc::new(CourseOutlineTool::new(gateway)))?;
    Ok(registry)
}
