//! Pipeline orchestrator for Lektor.
//!
//! Builds the concrete components from settings and runs course ingestion:
//! parse course files, chunk lessons, embed, and index.

use crate::agent::{Agent, OpenAIChatModel};
use crate::chunking::TextChunker;
use crate::config::{Prompts, Settings, VectorStoreProvider};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{LektorError, Result};
use crate::rag::{CourseStore, NewChunk, RagSystem};
use crate::session::{MemorySessionStore, SessionStore};
use crate::vector_store::{CourseMetadata, LessonMetadata, MemoryVectorStore, SqliteVectorStore, VectorStore};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// A course file as stored on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct CourseDocument {
    pub title: String,
    #[serde(default)]
    pub instructor: Option<String>,
    #[serde(default)]
    pub course_link: Option<String>,
    #[serde(default)]
    pub lessons: Vec<LessonDocument>,
}

/// One lesson of a course file.
#[derive(Debug, Clone, Deserialize)]
pub struct LessonDocument {
    pub lesson_number: u32,
    pub lesson_title: String,
    #[serde(default)]
    pub lesson_link: Option<String>,
    #[serde(default)]
    pub content: String,
}

impl CourseDocument {
    /// Parse and validate a course from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let course: Self = serde_json::from_str(json)?;
        course.validate()?;
        Ok(course)
    }

    /// Load a course file.
    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json(&json)
            .map_err(|e| LektorError::Ingest(format!("{}: {}", path.display(), e)))
    }

    fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(LektorError::InvalidInput("Course title is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for lesson in &self.lessons {
            if !seen.insert(lesson.lesson_number) {
                return Err(LektorError::InvalidInput(format!(
                    "Duplicate lesson number {} in course '{}'",
                    lesson.lesson_number, self.title
                )));
            }
        }
        Ok(())
    }

    /// Catalog metadata for this course.
    pub fn metadata(&self) -> CourseMetadata {
        CourseMetadata {
            title: self.title.clone(),
            instructor: self.instructor.clone(),
            course_link: self.course_link.clone(),
            lessons: self
                .lessons
                .iter()
                .map(|l| LessonMetadata {
                    lesson_number: l.lesson_number,
                    lesson_title: l.lesson_title.clone(),
                    lesson_link: l.lesson_link.clone(),
                })
                .collect(),
        }
    }
}

/// Outcome of indexing one course.
#[derive(Debug, Clone)]
pub struct IndexResult {
    pub title: String,
    pub lessons: usize,
    pub chunks_indexed: usize,
    pub skipped: bool,
}

/// The main orchestrator for Lektor.
pub struct Orchestrator {
    settings: Settings,
    prompts: Prompts,
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<dyn VectorStore>,
    course_store: Arc<CourseStore>,
    chunker: TextChunker,
}

impl Orchestrator {
    /// Create a new orchestrator from settings.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(settings.prompts.custom_dir.as_deref())?;
        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::from_settings(&settings.embedding)?);

        let vector_store: Arc<dyn VectorStore> = match settings.vector_store.provider {
            VectorStoreProvider::Sqlite => {
                let path = settings.sqlite_path();
                info!("Using SQLite vector store at {}", path.display());
                Arc::new(SqliteVectorStore::new(&path)?)
            }
            VectorStoreProvider::Memory => {
                info!("Using in-memory vector store");
                Arc::new(MemoryVectorStore::new())
            }
        };

        Ok(Self::with_components(settings, prompts, embedder, vector_store))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Self {
        let course_store = Arc::new(
            CourseStore::new(vector_store.clone(), embedder.clone())
                .with_max_results(settings.search.max_results)
                .with_resolve_min_score(settings.search.resolve_min_score),
        );
        let chunker = TextChunker::new(settings.search.chunk_size, settings.search.chunk_overlap);

        Self {
            settings,
            prompts,
            embedder,
            vector_store,
            course_store,
            chunker,
        }
    }

    /// Get the vector store.
    pub fn vector_store(&self) -> Arc<dyn VectorStore> {
        self.vector_store.clone()
    }

    /// Get the embedder.
    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    /// Get the course store.
    pub fn course_store(&self) -> Arc<CourseStore> {
        self.course_store.clone()
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Build a RAG system using the configured OpenAI chat model and an
    /// in-memory session store.
    pub fn rag_system(&self) -> Result<RagSystem> {
        let sessions: Arc<dyn SessionStore> =
            Arc::new(MemorySessionStore::new(self.settings.session.max_history));
        self.rag_system_with_sessions(sessions)
    }

    /// Build a RAG system sharing the given session store.
    pub fn rag_system_with_sessions(&self, sessions: Arc<dyn SessionStore>) -> Result<RagSystem> {
        let llm = &self.settings.llm;
        let model = Arc::new(OpenAIChatModel::new(
            &llm.model,
            Duration::from_secs(llm.timeout_seconds),
        )?);
        let agent = Agent::from_settings(model, llm, &self.prompts);
        Ok(RagSystem::new(self.course_store.clone(), agent, sessions))
    }

    /// Chunk a course's lessons. The first chunk of each lesson carries a
    /// `Lesson <n> content:` prefix.
    pub fn chunk_course(&self, course: &CourseDocument) -> Vec<NewChunk> {
        let mut lessons: Vec<&LessonDocument> = course.lessons.iter().collect();
        lessons.sort_by_key(|l| l.lesson_number);

        let mut chunks = Vec::new();
        for lesson in lessons {
            for (i, piece) in self.chunker.chunk(&lesson.content).into_iter().enumerate() {
                let content = if i == 0 {
                    format!("Lesson {} content: {}", lesson.lesson_number, piece)
                } else {
                    piece
                };
                chunks.push(NewChunk {
                    lesson_number: Some(lesson.lesson_number),
                    content,
                });
            }
        }
        chunks
    }

    /// Index one course. Already indexed titles are skipped unless `force`.
    #[instrument(skip(self, course), fields(title = %course.title))]
    pub async fn index_course(&self, course: &CourseDocument, force: bool) -> Result<IndexResult> {
        let existing = self
            .course_store
            .get_course_outline_metadata(&course.title)
            .await?;
        if existing.is_some() {
            if !force {
                info!("Course '{}' is already indexed, skipping", course.title);
                return Ok(IndexResult {
                    title: course.title.clone(),
                    lessons: course.lessons.len(),
                    chunks_indexed: 0,
                    skipped: true,
                });
            }
            let removed = self.course_store.delete_course(&course.title).await?;
            info!("Removed {} old chunks for '{}'", removed, course.title);
        }

        let chunks = self.chunk_course(course);
        info!("Indexing {} chunks for '{}'", chunks.len(), course.title);

        self.course_store.add_course_metadata(&course.metadata()).await?;
        let chunks_indexed = self
            .course_store
            .add_course_content(&course.title, &chunks)
            .await?;

        Ok(IndexResult {
            title: course.title.clone(),
            lessons: course.lessons.len(),
            chunks_indexed,
            skipped: false,
        })
    }

    /// Index a course file, or every `*.json` file in a directory.
    ///
    /// Unreadable files in a directory are logged and skipped.
    pub async fn index_path(&self, path: &Path, force: bool) -> Result<Vec<IndexResult>> {
        let metadata = tokio::fs::metadata(path).await.map_err(|_| {
            LektorError::InvalidInput(format!("Path does not exist: {}", path.display()))
        })?;

        if metadata.is_file() {
            let course = CourseDocument::load(path).await?;
            return Ok(vec![self.index_course(&course, force).await?]);
        }

        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file = entry.path();
            if entry.file_type().await?.is_file() && file.extension().is_some_and(|ext| ext == "json") {
                files.push(file);
            }
        }
        files.sort();

        let mut results = Vec::with_capacity(files.len());
        for file in files {
            match CourseDocument::load(&file).await {
                Ok(course) => results.push(self.index_course(&course, force).await?),
                Err(e) => warn!("Skipping {}: {}", file.display(), e),
            }
        }
        Ok(results)
    }
}
