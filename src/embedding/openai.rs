//! Embeddings API adapter used for course titles, lesson chunks and queries.

use super::Embedder;
use crate::config::EmbeddingSettings;
use crate::error::{Result, SyllabusError};
use crate::openai::create_client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{CreateEmbeddingRequestArgs, Embedding, EmbeddingInput};
use async_openai::Client;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Embeds text through the OpenAI embeddings endpoint.
///
/// Ingestion sends every chunk of a course at once; those texts are split
/// into requests of at most `batch_size` inputs.
pub struct OpenAIEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
    dimensions: usize,
    batch_size: usize,
}

impl OpenAIEmbedder {
    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self> {
        Ok(Self {
            client: create_client()?,
            model: settings.model.clone(),
            dimensions: settings.dimensions as usize,
            batch_size: settings.batch_size.max(1),
        })
    }

    async fn request(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::StringArray(batch.to_vec()))
            .dimensions(self.dimensions as u32)
            .build()
            .map_err(|e| SyllabusError::Embedding(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| SyllabusError::OpenAI(format!("Embedding API error: {}", e)))?;

        in_input_order(response.data, batch.len())
    }
}

/// Vectors ordered by their input index. A short or gapped response is an
/// error, since chunks and vectors are zipped by position.
fn in_input_order(mut data: Vec<Embedding>, expected: usize) -> Result<Vec<Vec<f32>>> {
    data.sort_by_key(|e| e.index);

    let complete = data.len() == expected
        && data.iter().enumerate().all(|(i, e)| e.index as usize == i);
    if !complete {
        return Err(SyllabusError::Embedding(format!(
            "Expected {} embeddings, received {}",
            expected,
            data.len()
        )));
    }

    Ok(data.into_iter().map(|e| e.embedding).collect())
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.request(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| SyllabusError::Embedding("Empty embedding response".to_string()))
    }

    #[instrument(skip(self, texts), fields(count = texts.len(), model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            debug!("Embedding {} texts", batch.len());
            vectors.extend(self.request(batch).await?);
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
