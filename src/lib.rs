//! Syllabus - Course Materials Assistant
//!
//! Answers questions about course materials with a tool-calling language
//! model. The model can search lesson content or fetch a course outline
//! before it answers, and course and lesson mentions in the answer are
//! turned into links.
//!
//! # Architecture
//!
//! - `catalog` - Courses, lessons, chunks and course files
//! - `embedding` - Embedding generation
//! - `vector_store` - Course and chunk index with similarity search
//! - `rag` - Retrieval gateway, link annotation and the query pipeline
//! - `agent` - Search and outline tools, tool registry, tool-calling loop
//! - `llm` - Chat model providers (Anthropic, OpenAI)
//! - `session` - Bounded conversation history
//! - `config` - Settings and prompt templates
//!
//! # Example
//!
//! ```rust,no_run
//! use syllabus::config::Settings;
//! use syllabus::rag::RagSystem;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let system = RagSystem::new(&settings)?;
//!
//!     let response = system.query("What does lesson 2 of the Python course cover?", None).await?;
//!     println!("{}", response.answer);
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod openai;
pub mod rag;
pub mod session;
pub mod vector_store;

#[cfg(test)]
mod testing;

pub use error::{Result, SyllabusError};
