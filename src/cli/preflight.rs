//! Pre-flight checks before operations that call remote APIs.
//!
//! Fails fast with a readable message instead of erroring on the first
//! model or embedding request.

use crate::config::{ModelProvider, Settings};
use crate::error::{Result, SyllabusError};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Answering needs the chat model key and the embedding key.
    Ask,
    /// Content search embeds the query.
    Search,
    /// Ingestion embeds titles and chunks.
    Ingest,
    /// Listing courses reads only the local catalog.
    Courses,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Ask => {
            check_api_key(settings.model.provider.api_key_env())?;
            check_api_key(ModelProvider::OpenAI.api_key_env())?;
        }
        Operation::Search | Operation::Ingest => {
            check_api_key(ModelProvider::OpenAI.api_key_env())?;
        }
        Operation::Courses => {}
    }
    Ok(())
}

fn check_api_key(var: &str) -> Result<()> {
    match std::env::var(var) {
        Ok(key) if !key.is_empty() => Ok(()),
        Ok(_) => Err(SyllabusError::Config(format!(
            "{} is empty. Set it with: export {}='...'",
            var, var
        ))),
        Err(_) => Err(SyllabusError::Config(format!(
            "{} not set. Set it with: export {}='...'",
            var, var
        ))),
    }
}
