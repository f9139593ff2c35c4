//! Retrieval, citation and answer post-processing for course questions.
//!
//! The [`RetrievalGateway`] resolves course names and runs filtered content
//! searches, [`LinkAnnotator`] turns course and lesson mentions into links,
//! and [`RagSystem`] wires both to the tool-calling orchestrator.

mod links;
mod retrieval;
mod system;

pub use links::LinkAnnotator;
pub use retrieval::{ChunkMetadata, RetrievalGateway, SearchHit, SearchResults};
pub use system::{CourseAnalytics, IngestSummary, QueryResponse, RagSystem};

use serde::{Deserialize, Serialize};

/// A citation for content that backed an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// `"<course> - Lesson <n>"`, or the bare course title.
    pub text: String,
    pub link: Option<String>,
    /// Display relevance, 0 to 100.
    pub score: u32,
}

impl Source {
    pub fn new(course_title: &str, lesson_number: Option<u32>, link: Option<String>, score: u32) -> Self {
        let text = match lesson_number {
            Some(n) => format!("{} - Lesson {}", course_title, n),
            None => course_title.to_string(),
        };
        Self { text, link, score }
    }

    /// Course title recovered from the citation text.
    pub fn course_title(&self) -> &str {
        match self.text.split_once(" - Lesson") {
            Some((title, _)) => title,
            None => &self.text,
        }
    }
}

/// Map a cosine distance onto a 0 to 100 display score.
pub fn relevance_score(distance: f32) -> u32 {
    (100.0 - distance * 50.0).round().max(0.0) as u32
}
