//! Courses command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::rag::RetrievalGateway;
use anyhow::Result;

/// List indexed courses.
pub async fn run_courses(settings: Settings) -> Result<()> {
    let gateway = RetrievalGateway::from_settings(&settings)?;

    let courses = match gateway.courses().await {
        Ok(courses) => courses,
        Err(e) => {
            Output::error(&format!("Failed to list courses: {}", e));
            return Err(e.into());
        }
    };

    if courses.is_empty() {
        Output::info("No courses indexed yet. Use 'syllabus ingest <dir>' to add some.");
        return Ok(());
    }

    Output::header(&format!("Indexed Courses ({})", courses.len()));
    println!();
    for course in &courses {
        Output::course_info(
            &course.title,
            course.instructor.as_deref(),
            course.lessons.len(),
            course.course_link.as_deref(),
        );
    }

    println!();
    Output::kv("Total courses", &courses.len().to_string());
    Output::kv("Total chunks", &gateway.chunk_count().await?.to_string());

    Ok(())
}
