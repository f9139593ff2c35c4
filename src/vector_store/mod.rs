//! Vector store abstraction for the course catalog.
//!
//! Two collections live behind one trait: course metadata (one embedding per
//! course title, used to resolve fuzzy course names) and course content
//! (one embedding per chunk, used for similarity search).

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::catalog::{Course, CourseChunk};
use crate::config::Settings;
use crate::error::{Result, SyllabusError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// A course with the embedding of its title.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseRecord {
    pub course: Course,
    pub embedding: Vec<f32>,
    pub indexed_at: DateTime<Utc>,
}

impl CourseRecord {
    pub fn new(course: Course, embedding: Vec<f32>) -> Self {
        Self {
            course,
            embedding,
            indexed_at: Utc::now(),
        }
    }
}

/// A content chunk with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: Uuid,
    pub chunk: CourseChunk,
    pub embedding: Vec<f32>,
    pub indexed_at: DateTime<Utc>,
}

impl ChunkRecord {
    pub fn new(chunk: CourseChunk, embedding: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            chunk,
            embedding,
            indexed_at: Utc::now(),
        }
    }
}

/// Equality filter on chunk metadata. Empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentFilter {
    pub course_title: Option<String>,
    pub lesson_number: Option<u32>,
}

impl ContentFilter {
    pub fn is_empty(&self) -> bool {
        self.course_title.is_none() && self.lesson_number.is_none()
    }

    pub fn matches(&self, chunk: &CourseChunk) -> bool {
        let course_ok = self
            .course_title
            .as_ref()
            .is_none_or(|t| *t == chunk.course_title);
        let lesson_ok = self
            .lesson_number
            .is_none_or(|n| chunk.lesson_number == Some(n));
        course_ok && lesson_ok
    }
}

/// A chunk matched by similarity search.
#[derive(Debug, Clone)]
pub struct ChunkMatch {
    pub chunk: CourseChunk,
    /// Cosine distance to the query (lower is more similar).
    pub distance: f32,
}

/// A course matched by title similarity.
#[derive(Debug, Clone)]
pub struct CourseMatch {
    pub course: Course,
    pub distance: f32,
}

/// Open the configured backend.
pub fn open_store(settings: &Settings) -> Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match settings.vector_store.provider.as_str() {
        "sqlite" => Arc::new(SqliteVectorStore::new(&settings.sqlite_path())?),
        "memory" => Arc::new(MemoryVectorStore::new()),
        other => {
            return Err(SyllabusError::Config(format!(
                "Unknown vector store provider: {}",
                other
            )))
        }
    };
    Ok(store)
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store course metadata, replacing any course with the same title.
    async fn upsert_course(&self, record: &CourseRecord) -> Result<()>;

    /// Bulk insert content chunks.
    async fn upsert_chunks(&self, records: &[ChunkRecord]) -> Result<usize>;

    /// Nearest chunks to the query embedding, ascending by distance.
    async fn search_chunks(
        &self,
        query_embedding: &[f32],
        filter: &ContentFilter,
        limit: usize,
    ) -> Result<Vec<ChunkMatch>>;

    /// Course whose title embedding is nearest to the query embedding.
    async fn nearest_course(&self, query_embedding: &[f32]) -> Result<Option<CourseMatch>>;

    /// Get a course by exact title.
    async fn get_course(&self, title: &str) -> Result<Option<Course>>;

    /// List all courses, ordered by title.
    async fn list_courses(&self) -> Result<Vec<Course>>;

    /// Delete a course and its chunks. Returns the number of chunks removed.
    async fn delete_course(&self, title: &str) -> Result<usize>;

    /// Remove every course and chunk.
    async fn clear(&self) -> Result<()>;

    /// Total number of stored chunks.
    async fn chunk_count(&self) -> Result<usize>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Cosine distance in `[0, 2]`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    (1.0 - cosine_similarity(a, b)).clamp(0.0, 2.0)
}

/// Sort by ascending distance and keep the first `limit`.
pub(crate) fn rank_matches(mut matches: Vec<ChunkMatch>, limit: usize) -> Vec<ChunkMatch> {
    matches.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
    });
    matches.truncate(limit);
    matches
}
