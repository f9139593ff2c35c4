//! Search command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::rag::{relevance_score, RetrievalGateway};
use anyhow::Result;

/// Run the search command.
pub async fn run_search(
    query: &str,
    course: Option<&str>,
    lesson: Option<u32>,
    limit: Option<usize>,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Search, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let gateway = RetrievalGateway::from_settings(&settings)?;

    let spinner = Output::spinner("Searching...");
    let results = gateway.search(query, course, lesson, limit).await;
    spinner.finish_and_clear();

    if let Some(error) = results.error() {
        Output::error(error);
        return Err(anyhow::anyhow!("{}", error));
    }

    if results.is_empty() {
        Output::warning("No results found matching your query.");
        return Ok(());
    }

    Output::success(&format!("Found {} results", results.len()));
    for hit in results.hits() {
        Output::search_hit(hit, relevance_score(hit.distance));
    }

    Ok(())
}
