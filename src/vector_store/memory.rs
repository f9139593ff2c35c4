//! In-memory vector store implementation.
//!
//! Useful for testing and small catalogs.

use super::{
    cosine_distance, rank_matches, ChunkMatch, ChunkRecord, ContentFilter, CourseMatch,
    CourseRecord, VectorStore,
};
use crate::catalog::Course;
use crate::error::{Result, SyllabusError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Collections {
    /// Keyed by course title.
    courses: BTreeMap<String, CourseRecord>,
    chunks: Vec<ChunkRecord>,
}

/// In-memory vector store.
pub struct MemoryVectorStore {
    inner: RwLock<Collections>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Collections::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Collections>> {
        self.inner
            .read()
            .map_err(|e| SyllabusError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Collections>> {
        self.inner
            .write()
            .map_err(|e| SyllabusError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert_course(&self, record: &CourseRecord) -> Result<()> {
        let mut inner = self.write()?;
        inner
            .courses
            .insert(record.course.title.clone(), record.clone());
        Ok(())
    }

    async fn upsert_chunks(&self, records: &[ChunkRecord]) -> Result<usize> {
        let mut inner = self.write()?;
        for record in records {
            inner.chunks.retain(|c| c.id != record.id);
            inner.chunks.push(record.clone());
        }
        Ok(records.len())
    }

    async fn search_chunks(
        &self,
        query_embedding: &[f32],
        filter: &ContentFilter,
        limit: usize,
    ) -> Result<Vec<ChunkMatch>> {
        let inner = self.read()?;

        let matches: Vec<ChunkMatch> = inner
            .chunks
            .iter()
            .filter(|r| filter.matches(&r.chunk))
            .map(|r| ChunkMatch {
                chunk: r.chunk.clone(),
                distance: cosine_distance(query_embedding, &r.embedding),
            })
            .collect();

        Ok(rank_matches(matches, limit))
    }

    async fn nearest_course(&self, query_embedding: &[f32]) -> Result<Option<CourseMatch>> {
        let inner = self.read()?;

        let best = inner
            .courses
            .values()
            .map(|r| (r, cosine_distance(query_embedding, &r.embedding)))
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        Ok(best.map(|(r, distance)| CourseMatch {
            course: r.course.clone(),
            distance,
        }))
    }

    async fn get_course(&self, title: &str) -> Result<Option<Course>> {
        let inner = self.read()?;
        Ok(inner.courses.get(title).map(|r| r.course.clone()))
    }

    async fn list_courses(&self) -> Result<Vec<Course>> {
        let inner = self.read()?;
        Ok(inner.courses.values().map(|r| r.course.clone()).collect())
    }

    async fn delete_course(&self, title: &str) -> Result<usize> {
        let mut inner = self.write()?;
        inner.courses.remove(title);
        let initial_len = inner.chunks.len();
        inner.chunks.retain(|c| c.chunk.course_title != title);
        Ok(initial_len - inner.chunks.len())
    }

    async fn clear(&self) -> Result<()> {
        let mut inner = self.write()?;
        inner.courses.clear();
        inner.chunks.clear();
        Ok(())
    }

    async fn chunk_count(&self) -> Result<usize> {
        Ok(self.read()?.chunks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CourseChunk;

    fn chunk(course: &str, lesson: Option<u32>, index: u32, content: &str) -> CourseChunk {
        CourseChunk {
            content: content.to_string(),
            course_title: course.to_string(),
            lesson_number: lesson,
            chunk_index: index,
        }
    }

    #[tokio::test]
    async fn test_memory_vector_store() {
        let store = MemoryVectorStore::new();

        store
            .upsert_course(&CourseRecord::new(Course::new("Python", None), vec![1.0, 0.0, 0.0]))
            .await
            .unwrap();
        store
            .upsert_course(&CourseRecord::new(Course::new("Rust", None), vec![0.0, 1.0, 0.0]))
            .await
            .unwrap();

        store
            .upsert_chunks(&[
                ChunkRecord::new(chunk("Python", Some(1), 0, "Hello world"), vec![1.0, 0.0, 0.0]),
                ChunkRecord::new(chunk("Python", Some(2), 1, "Goodbye world"), vec![0.0, 1.0, 0.0]),
                ChunkRecord::new(chunk("Rust", Some(1), 0, "Ownership"), vec![0.7, 0.7, 0.0]),
            ])
            .await
            .unwrap();

        assert_eq!(store.chunk_count().await.unwrap(), 3);

        let results = store
            .search_chunks(&[1.0, 0.0, 0.0], &ContentFilter::default(), 10)
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].chunk.content, "Hello world");
        assert!(results[0].distance <= results[1].distance);
        assert!(results[1].distance <= results[2].distance);

        let filtered = store
            .search_chunks(
                &[1.0, 0.0, 0.0],
                &ContentFilter {
                    course_title: Some("Python".to_string()),
                    lesson_number: Some(2),
                },
                10,
            )
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].chunk.content, "Goodbye world");

        let nearest = store.nearest_course(&[0.1, 0.9, 0.0]).await.unwrap().unwrap();
        assert_eq!(nearest.course.title, "Rust");

        let titles: Vec<String> = store
            .list_courses()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.title)
            .collect();
        assert_eq!(titles, vec!["Python", "Rust"]);

        assert_eq!(store.delete_course("Python").await.unwrap(), 2);
        assert_eq!(store.chunk_count().await.unwrap(), 1);
        assert!(store.get_course("Python").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_store() {
        let store = MemoryVectorStore::new();
        assert!(store.nearest_course(&[1.0]).await.unwrap().is_none());
        assert!(store
            .search_chunks(&[1.0], &ContentFilter::default(), 5)
            .await
            .unwrap()
            .is_empty());
    }
}
