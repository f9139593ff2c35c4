//! Retrieval gateway over the course catalog.
//!
//! Resolves fuzzy course names to canonical titles and runs filtered
//! similarity searches. Search failures are reported in-band through
//! [`SearchResults::error`] rather than as `Err`.

use crate::catalog::{Course, CourseDocument};
use crate::config::Settings;
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{Result, SyllabusError};
use crate::vector_store::{
    open_store, ChunkRecord, ContentFilter, CourseMatch, CourseRecord, VectorStore,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Metadata attached to a matched chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkMetadata {
    pub course_title: String,
    pub lesson_number: Option<u32>,
}

/// One row of a search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub document: String,
    pub metadata: ChunkMetadata,
    /// Lower is more similar.
    pub distance: f32,
}

/// Ranked rows of a content search, or the reason the search failed.
///
/// Rows keep document, metadata and distance together so the three views
/// are always the same length and index-aligned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    hits: Vec<SearchHit>,
    error: Option<String>,
}

impl SearchResults {
    pub fn from_hits(hits: Vec<SearchHit>) -> Self {
        Self { hits, error: None }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// A failed search. Carries no rows.
    pub fn with_error(message: impl Into<String>) -> Self {
        Self {
            hits: Vec::new(),
            error: Some(message.into()),
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn hits(&self) -> &[SearchHit] {
        &self.hits
    }

    pub fn documents(&self) -> Vec<&str> {
        self.hits.iter().map(|h| h.document.as_str()).collect()
    }

    pub fn metadata(&self) -> Vec<&ChunkMetadata> {
        self.hits.iter().map(|h| &h.metadata).collect()
    }

    pub fn distances(&self) -> Vec<f32> {
        self.hits.iter().map(|h| h.distance).collect()
    }
}

/// Course resolution and filtered content search.
pub struct RetrievalGateway {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    max_results: usize,
}

impl RetrievalGateway {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>, max_results: usize) -> Self {
        if max_results == 0 {
            warn!("search.max_results is 0; content searches will return no results");
        }
        Self {
            store,
            embedder,
            max_results,
        }
    }

    /// Gateway over the configured store and embedding model.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let embedder = Arc::new(OpenAIEmbedder::from_settings(&settings.embedding)?);
        Ok(Self::new(open_store(settings)?, embedder, settings.search.max_results))
    }

    /// Default number of results per search.
    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// Search course content.
    ///
    /// A `course_name` is first resolved to one canonical title; when nothing
    /// matches, no content query is made.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
        limit: Option<usize>,
    ) -> SearchResults {
        let mut filter = ContentFilter {
            course_title: None,
            lesson_number,
        };

        if let Some(name) = course_name.filter(|n| !n.is_empty()) {
            match self.resolve_course(name).await {
                Ok(Some(found)) => filter.course_title = Some(found.course.title),
                Ok(None) => {
                    return SearchResults::with_error(format!(
                        "No course found matching '{}'",
                        name
                    ))
                }
                Err(e) => return SearchResults::with_error(format!("Search error: {}", e)),
            }
        }

        let limit = limit.unwrap_or(self.max_results);
        if limit == 0 {
            warn!("Search limit is 0; returning no results");
            return SearchResults::empty();
        }

        match self.search_content(query, &filter, limit).await {
            Ok(results) => {
                debug!("Search returned {} rows", results.len());
                results
            }
            Err(e) => SearchResults::with_error(format!("Search error: {}", e)),
        }
    }

    async fn search_content(
        &self,
        query: &str,
        filter: &ContentFilter,
        limit: usize,
    ) -> Result<SearchResults> {
        let embedding = self.embedder.embed(query).await?;
        let matches = self.store.search_chunks(&embedding, filter, limit).await?;

        let hits = matches
            .into_iter()
            .map(|m| SearchHit {
                document: m.chunk.content,
                metadata: ChunkMetadata {
                    course_title: m.chunk.course_title,
                    lesson_number: m.chunk.lesson_number,
                },
                distance: m.distance,
            })
            .collect();

        Ok(SearchResults::from_hits(hits))
    }

    /// Resolve a course name to the best-matching course.
    ///
    /// An exact title wins outright; otherwise the nearest title by
    /// embedding is taken with no distance cut-off.
    #[instrument(skip(self))]
    pub async fn resolve_course(&self, name: &str) -> Result<Option<CourseMatch>> {
        if let Some(course) = self.store.get_course(name).await? {
            return Ok(Some(CourseMatch {
                course,
                distance: 0.0,
            }));
        }

        let embedding = self.embedder.embed(name).await?;
        let found = self.store.nearest_course(&embedding).await?;
        if let Some(m) = &found {
            debug!("Resolved '{}' to '{}' ({:.3})", name, m.course.title, m.distance);
        }
        Ok(found)
    }

    /// Course by exact title.
    pub async fn course(&self, title: &str) -> Result<Option<Course>> {
        self.store.get_course(title).await
    }

    /// All courses, ordered by title.
    pub async fn courses(&self) -> Result<Vec<Course>> {
        self.store.list_courses().await
    }

    pub async fn course_titles(&self) -> Result<Vec<String>> {
        Ok(self.courses().await?.into_iter().map(|c| c.title).collect())
    }

    pub async fn course_count(&self) -> Result<usize> {
        Ok(self.courses().await?.len())
    }

    /// Link of a lesson, if both course and lesson exist and it has one.
    pub async fn lesson_link(&self, course_title: &str, lesson_number: u32) -> Result<Option<String>> {
        Ok(self
            .course(course_title)
            .await?
            .and_then(|c| c.lesson_link(lesson_number).map(str::to_string)))
    }

    /// Index a course file: title embedding for resolution plus one
    /// embedding per chunk. A course with the same title is replaced,
    /// chunks included. Returns the number of chunks stored.
    #[instrument(skip(self, doc), fields(title = %doc.course.title))]
    pub async fn add_course_document(&self, doc: &CourseDocument) -> Result<usize> {
        doc.course.validate()?;

        let title_embedding = self.embedder.embed(&doc.course.title).await?;
        let chunks = doc.course_chunks();
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(SyllabusError::Embedding(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        // Old chunks go only once every embedding has succeeded.
        let replaced = self.store.delete_course(&doc.course.title).await?;
        if replaced > 0 {
            info!("Replacing {} existing chunks", replaced);
        }

        self.store
            .upsert_course(&CourseRecord::new(doc.course.clone(), title_embedding))
            .await?;

        let records: Vec<ChunkRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| ChunkRecord::new(chunk, embedding))
            .collect();
        if records.is_empty() {
            return Ok(0);
        }

        let stored = self.store.upsert_chunks(&records).await?;
        info!("Indexed {} chunks", stored);
        Ok(stored)
    }

    /// Remove one course and its chunks. Returns the number of chunks removed,
    /// or `None` when no course has that exact title.
    pub async fn remove_course(&self, title: &str) -> Result<Option<usize>> {
        if self.store.get_course(title).await?.is_none() {
            return Ok(None);
        }
        let removed = self.store.delete_course(title).await?;
        info!("Removed course {} with {} chunks", title, removed);
        Ok(Some(removed))
    }

    /// Remove every course and chunk.
    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await
    }

    pub async fn chunk_count(&self) -> Result<usize> {
        self.store.chunk_count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        sample_document, seeded_gateway, FailingEmbedder, KeywordEmbedder, RecordingStore,
    };

    #[tokio::test]
    async fn test_search_returns_ranked_rows() {
        let (_, gateway) = seeded_gateway(5).await;

        let results = gateway.search("What are variables in Python", None, None, None).await;
        assert!(results.error().is_none());
        assert!(!results.is_empty());
        assert_eq!(results.documents().len(), results.distances().len());
        assert_eq!(results.metadata().len(), results.len());
        assert_eq!(results.metadata()[0].lesson_number, Some(2));

        let distances = results.distances();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_course_filter_resolves_fuzzy_name() {
        let (_, gateway) = seeded_gateway(5).await;

        let results = gateway
            .search("model", Some("machine learning"), None, None)
            .await;
        assert!(!results.is_empty());
        assert!(results
            .metadata()
            .iter()
            .all(|m| m.course_title == "Machine Learning Basics"));
    }

    #[tokio::test]
    async fn test_lesson_filter() {
        let (_, gateway) = seeded_gateway(5).await;

        let results = gateway
            .search("Python", Some("Introduction to Python"), Some(1), None)
            .await;
        assert_eq!(results.len(), 1);
        assert_eq!(results.metadata()[0].lesson_number, Some(1));
    }

    #[tokio::test]
    async fn test_explicit_limit_overrides_default() {
        let (_, gateway) = seeded_gateway(5).await;
        let results = gateway.search("learning", None, None, Some(1)).await;
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_max_results_returns_empty() {
        let (store, gateway) = seeded_gateway(0).await;

        let results = gateway.search("Python", None, None, None).await;
        assert!(results.is_empty());
        assert!(results.error().is_none());
        assert_eq!(store.search_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_course_on_empty_catalog_skips_content_search() {
        let store = Arc::new(RecordingStore::default());
        let gateway = RetrievalGateway::new(store.clone(), Arc::new(KeywordEmbedder), 5);

        let results = gateway.search("anything", Some("Rust"), None, None).await;
        assert_eq!(results.error(), Some("No course found matching 'Rust'"));
        assert!(results.is_empty());
        assert_eq!(store.search_count(), 0);
    }

    #[tokio::test]
    async fn test_index_failure_is_reported_in_band() {
        let gateway = RetrievalGateway::new(
            Arc::new(RecordingStore::failing()),
            Arc::new(KeywordEmbedder),
            5,
        );
        let results = gateway.search("Python", None, None, None).await;
        let error = results.error().unwrap();
        assert!(error.starts_with("Search error: "));
        assert!(results.is_empty());

        let gateway = RetrievalGateway::new(
            Arc::new(RecordingStore::default()),
            Arc::new(FailingEmbedder),
            5,
        );
        let results = gateway.search("Python", None, None, None).await;
        assert!(results.error().unwrap().contains("connection failed"));
    }

    #[tokio::test]
    async fn test_reindexing_replaces_chunks() {
        let (_, gateway) = seeded_gateway(5).await;
        assert_eq!(gateway.chunk_count().await.unwrap(), 4);

        let mut doc = sample_document();
        doc.chunks.truncate(1);
        assert_eq!(gateway.add_course_document(&doc).await.unwrap(), 1);

        assert_eq!(gateway.chunk_count().await.unwrap(), 3);
        assert_eq!(gateway.course_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_remove_course() {
        let (_, gateway) = seeded_gateway(5).await;

        assert_eq!(
            gateway.remove_course("Machine Learning Basics").await.unwrap(),
            Some(2)
        );
        assert_eq!(gateway.remove_course("Machine Learning Basics").await.unwrap(), None);
        assert_eq!(gateway.course_titles().await.unwrap(), vec!["Introduction to Python"]);
        assert_eq!(gateway.chunk_count().await.unwrap(), 2);

        let results = gateway.search("model", None, None, None).await;
        assert!(results
            .metadata()
            .iter()
            .all(|m| m.course_title == "Introduction to Python"));
    }

    #[tokio::test]
    async fn test_catalog_lookups() {
        let (_, gateway) = seeded_gateway(5).await;

        assert_eq!(gateway.course_count().await.unwrap(), 2);
        assert_eq!(
            gateway.course_titles().await.unwrap(),
            vec!["Introduction to Python", "Machine Learning Basics"]
        );
        assert_eq!(
            gateway.lesson_link("Introduction to Python", 1).await.unwrap().as_deref(),
            Some("https://example.com/python/1")
        );
        assert_eq!(gateway.lesson_link("Machine Learning Basics", 2).await.unwrap(), None);
        assert_eq!(gateway.lesson_link("Nope", 1).await.unwrap(), None);
        assert_eq!(gateway.chunk_count().await.unwrap(), 4);

        let exact = gateway.resolve_course("Introduction to Python").await.unwrap().unwrap();
        assert_eq!(exact.distance, 0.0);
    }
}
