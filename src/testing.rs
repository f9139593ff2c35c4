//! Deterministic fakes and fixtures shared by unit tests.

use crate::catalog::{ChunkInput, Course, CourseDocument};
use crate::embedding::Embedder;
use crate::error::{Result, SyllabusError};
use crate::llm::{ChatModel, CompletionRequest, ContentBlock, ModelResponse, StopReason};
use crate::rag::RetrievalGateway;
use crate::vector_store::{
    ChunkMatch, ChunkRecord, ContentFilter, CourseMatch, CourseRecord, MemoryVectorStore,
    VectorStore,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const DIMENSIONS: usize = 512;

/// Bag-of-words embedder: each lowercase word is hashed into a bucket.
pub struct KeywordEmbedder;

impl KeywordEmbedder {
    fn bucket(word: &str) -> usize {
        let hash = word
            .bytes()
            .fold(0xcbf29ce484222325u64, |h, b| (h ^ b as u64).wrapping_mul(0x100000001b3));
        (hash % DIMENSIONS as u64) as usize
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIMENSIONS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            v[Self::bucket(&word.to_lowercase())] += 1.0;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }
}

/// Embedder whose backend is always down.
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(SyllabusError::Embedding("connection failed".to_string()))
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(SyllabusError::Embedding("connection failed".to_string()))
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }
}

/// Memory store that counts content searches and can fail them on demand.
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryVectorStore,
    searches: AtomicUsize,
    fail_search: bool,
}

impl RecordingStore {
    pub fn failing() -> Self {
        Self {
            fail_search: true,
            ..Self::default()
        }
    }

    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorStore for RecordingStore {
    async fn upsert_course(&self, record: &CourseRecord) -> Result<()> {
        self.inner.upsert_course(record).await
    }

    async fn upsert_chunks(&self, records: &[ChunkRecord]) -> Result<usize> {
        self.inner.upsert_chunks(records).await
    }

    async fn search_chunks(
        &self,
        query_embedding: &[f32],
        filter: &ContentFilter,
        limit: usize,
    ) -> Result<Vec<ChunkMatch>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if self.fail_search {
            return Err(SyllabusError::VectorStore("index unavailable".to_string()));
        }
        self.inner.search_chunks(query_embedding, filter, limit).await
    }

    async fn nearest_course(&self, query_embedding: &[f32]) -> Result<Option<CourseMatch>> {
        self.inner.nearest_course(query_embedding).await
    }

    async fn get_course(&self, title: &str) -> Result<Option<Course>> {
        self.inner.get_course(title).await
    }

    async fn list_courses(&self) -> Result<Vec<Course>> {
        self.inner.list_courses().await
    }

    async fn delete_course(&self, title: &str) -> Result<usize> {
        self.inner.delete_course(title).await
    }

    async fn clear(&self) -> Result<()> {
        self.inner.clear().await
    }

    async fn chunk_count(&self) -> Result<usize> {
        self.inner.chunk_count().await
    }
}

/// Model that replays canned responses and records every request.
pub struct ScriptedModel {
    script: Mutex<VecDeque<ModelResponse>>,
    repeat: Option<ModelResponse>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    /// Replay `responses` in order; fail once they run out.
    pub fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every call with the same response.
    pub fn repeating(response: ModelResponse) -> Self {
        Self {
            repeat: Some(response),
            ..Self::new(Vec::new())
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<ModelResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.script.lock().unwrap().pop_front();
        next.or_else(|| self.repeat.clone())
            .ok_or_else(|| SyllabusError::Model("script exhausted".to_string()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// A response requesting one tool call.
pub fn tool_use(id: &str, name: &str, input: Value) -> ModelResponse {
    tool_uses(vec![(id, name, input)])
}

/// A response requesting several tool calls in one round.
pub fn tool_uses(calls: Vec<(&str, &str, Value)>) -> ModelResponse {
    ModelResponse {
        stop_reason: Some(StopReason::ToolUse),
        content: calls
            .into_iter()
            .map(|(id, name, input)| ContentBlock::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
                input,
            })
            .collect(),
    }
}

pub fn sample_course() -> Course {
    let mut course = Course::new(
        "Introduction to Python",
        Some("https://example.com/python".to_string()),
    )
    .with_lesson(1, "Getting Started", Some("https://example.com/python/1".to_string()))
    .with_lesson(2, "Variables and Types", Some("https://example.com/python/2".to_string()));
    course.instructor = Some("John Doe".to_string());
    course
}

pub fn sample_document() -> CourseDocument {
    CourseDocument {
        course: sample_course(),
        chunks: vec![
            ChunkInput {
                lesson_number: Some(1),
                content: "Python is a programming language that is widely used for web development."
                    .to_string(),
            },
            ChunkInput {
                lesson_number: Some(2),
                content: "Variables store data values. In Python, you don't need to declare types."
                    .to_string(),
            },
        ],
    }
}

pub fn second_document() -> CourseDocument {
    CourseDocument {
        course: Course::new("Machine Learning Basics", Some("https://example.com/ml".to_string()))
            .with_lesson(1, "Supervised Learning", Some("https://example.com/ml/1".to_string()))
            .with_lesson(2, "Model Evaluation", None),
        chunks: vec![
            ChunkInput {
                lesson_number: Some(1),
                content: "Supervised learning trains a model on labeled examples.".to_string(),
            },
            ChunkInput {
                lesson_number: Some(2),
                content: "Evaluate a model with a held out test set.".to_string(),
            },
        ],
    }
}

/// A gateway over a recording store seeded with both sample courses.
pub async fn seeded_gateway(max_results: usize) -> (Arc<RecordingStore>, Arc<RetrievalGateway>) {
    let store = Arc::new(RecordingStore::default());
    let gateway = Arc::new(RetrievalGateway::new(
        store.clone(),
        Arc::new(KeywordEmbedder),
        max_results,
    ));
    gateway.add_course_document(&sample_document()).await.unwrap();
    gateway.add_course_document(&second_document()).await.unwrap();
    (store, gateway)
}
