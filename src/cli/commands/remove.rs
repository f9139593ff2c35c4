//! Remove command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::rag::RetrievalGateway;
use anyhow::Result;

/// Remove one course from the catalog.
pub async fn run_remove(title: &str, settings: Settings) -> Result<()> {
    let gateway = RetrievalGateway::from_settings(&settings)?;

    match gateway.remove_course(title).await {
        Ok(Some(chunks)) => {
            Output::success(&format!("Removed {} ({} chunks)", title, chunks));
            Ok(())
        }
        Ok(None) => {
            Output::warning(&format!("No course titled '{}'. Use 'syllabus courses' to list titles.", title));
            Err(anyhow::anyhow!("Course not found: {}", title))
        }
        Err(e) => {
            Output::error(&format!("Failed to remove course: {}", e));
            Err(e.into())
        }
    }
}
