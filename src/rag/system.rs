//! Top-level pipeline: ingestion, tool-assisted answers and analytics.

use super::{LinkAnnotator, RetrievalGateway, Source};
use crate::agent::{course_tools, Orchestrator};
use crate::catalog::{discover_course_files, load_course_document, CourseDocument};
use crate::config::{Prompts, Settings};
use crate::embedding::Embedder;
use crate::error::Result;
use crate::llm::{create_model, ChatModel};
use crate::session::SessionManager;
use crate::vector_store::VectorStore;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Answer to a query, with the citations that backed it.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<Source>,
}

/// Catalog overview.
#[derive(Debug, Clone, Serialize)]
pub struct CourseAnalytics {
    pub total_courses: usize,
    pub course_titles: Vec<String>,
}

/// Outcome of ingesting a folder of course files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub courses_added: usize,
    pub chunks_added: usize,
    /// Courses already in the catalog.
    pub skipped: usize,
}

/// Wires the retrieval gateway, tools, model and sessions together.
pub struct RagSystem {
    gateway: Arc<RetrievalGateway>,
    orchestrator: Orchestrator,
    prompts: Prompts,
    sessions: SessionManager,
}

impl RagSystem {
    /// Build the system from configuration.
    pub fn new(settings: &Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;
        let gateway = Arc::new(RetrievalGateway::from_settings(settings)?);
        let model = create_model(&settings.model)?;

        info!(
            "Using {} model {} with {} vector store",
            settings.model.provider, settings.model.model, settings.vector_store.provider
        );

        Ok(Self::from_parts(settings, prompts, gateway, model))
    }

    /// Build the system with custom components.
    pub fn with_components(
        settings: &Settings,
        prompts: Prompts,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn ChatModel>,
    ) -> Self {
        let gateway = Arc::new(RetrievalGateway::new(
            store,
            embedder,
            settings.search.max_results,
        ));
        Self::from_parts(settings, prompts, gateway, model)
    }

    fn from_parts(
        settings: &Settings,
        prompts: Prompts,
        gateway: Arc<RetrievalGateway>,
        model: Arc<dyn ChatModel>,
    ) -> Self {
        let history_template = prompts.render_with_custom(&prompts.assistant.history, &HashMap::new());
        let orchestrator = Orchestrator::new(model, prompts.system_prompt())
            .with_max_tool_rounds(settings.model.max_tool_rounds)
            .with_history_template(history_template);

        Self {
            gateway,
            orchestrator,
            prompts,
            sessions: SessionManager::new(settings.session.max_history)
                .with_max_sessions(settings.session.max_sessions),
        }
    }

    pub fn gateway(&self) -> Arc<RetrievalGateway> {
        self.gateway.clone()
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Answer a question, optionally within a session.
    ///
    /// Each query gets its own tool registry, so concurrent queries never
    /// see each other's sources.
    #[instrument(skip(self, query))]
    pub async fn query(&self, query: &str, session_id: Option<&str>) -> Result<QueryResponse> {
        let prompt = self.prompts.query_prompt(query);
        let history = match session_id {
            Some(id) => self.sessions.history(id)?,
            None => None,
        };

        let mut tools = course_tools(self.gateway.clone())?;
        let answer = self
            .orchestrator
            .generate_response(&prompt, history.as_deref(), Some(&mut tools))
            .await?;

        let sources = tools.last_sources().to_vec();
        let courses = self.gateway.courses().await.unwrap_or_else(|e| {
            warn!("Could not load courses for link annotation: {}", e);
            Vec::new()
        });
        let answer = LinkAnnotator::new(courses)?.annotate(&answer, &sources);
        tools.reset_sources();

        if let Some(id) = session_id {
            self.sessions.add_exchange(id, query, &answer)?;
        }

        Ok(QueryResponse { answer, sources })
    }

    /// Index one parsed course document. Returns the number of chunks stored.
    pub async fn add_course_document(&self, doc: &CourseDocument) -> Result<usize> {
        self.gateway.add_course_document(doc).await
    }

    /// Remove a course by exact title. Returns the chunks removed, or `None`
    /// when the title is unknown.
    pub async fn remove_course(&self, title: &str) -> Result<Option<usize>> {
        self.gateway.remove_course(title).await
    }

    /// Index every course file in a folder, skipping titles already present.
    /// Files that fail to load are logged and left out.
    #[instrument(skip(self, dir), fields(dir = %dir.display()))]
    pub async fn add_course_folder(&self, dir: &Path, clear_existing: bool) -> Result<IngestSummary> {
        let files = discover_course_files(dir)?;

        if clear_existing {
            info!("Clearing existing catalog");
            self.gateway.clear().await?;
        }

        let mut known: HashSet<String> = self.gateway.course_titles().await?.into_iter().collect();
        let mut summary = IngestSummary::default();

        for path in files {
            let doc = match load_course_document(&path) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };

            if known.contains(&doc.course.title) {
                info!("Course already indexed: {}", doc.course.title);
                summary.skipped += 1;
                continue;
            }

            let chunks = self.add_course_document(&doc).await?;
            info!("Added course {} with {} chunks", doc.course.title, chunks);
            known.insert(doc.course.title);
            summary.courses_added += 1;
            summary.chunks_added += chunks;
        }

        Ok(summary)
    }

    pub async fn course_analytics(&self) -> Result<CourseAnalytics> {
        let course_titles = self.gateway.course_titles().await?;
        Ok(CourseAnalytics {
            total_courses: course_titles.len(),
            course_titles,
        })
    }
}
