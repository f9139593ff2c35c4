//! Ingest command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::rag::RagSystem;
use anyhow::Result;

/// Index every course file in a folder.
pub async fn run_ingest(dir: &str, clear: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ingest, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let system = RagSystem::new(&settings)?;
    let dir = Settings::expand_path(dir);

    let spinner = Output::spinner(&format!("Indexing courses from {}...", dir.display()));
    let result = system.add_course_folder(&dir, clear).await;
    spinner.finish_and_clear();

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            Output::error(&format!("Ingestion failed: {}", e));
            return Err(e.into());
        }
    };

    Output::success(&format!(
        "Added {} courses with {} chunks",
        summary.courses_added, summary.chunks_added
    ));
    if summary.skipped > 0 {
        Output::info(&format!("Skipped {} already indexed courses", summary.skipped));
    }

    let analytics = system.course_analytics().await?;
    Output::kv("Total courses", &analytics.total_courses.to_string());

    Ok(())
}
