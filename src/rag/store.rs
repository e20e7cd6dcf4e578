//! Course-aware retrieval over a vector store.
//!
//! [`CourseStore`] is what the search tools talk to. It resolves fuzzy course
//! names against the course catalog, runs filtered content searches, and
//! answers metadata lookups (lesson links, outlines, titles).

use crate::embedding::Embedder;
use crate::error::Result;
use crate::vector_store::{ChunkFilter, ChunkMetadata, ContentChunk, CourseMetadata, CourseRecord, VectorStore};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// One retrieved chunk: its text plus filterable metadata.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub document: String,
    pub metadata: ChunkMetadata,
    pub score: f32,
}

/// Outcome of a content search: hits, nothing, or an error message.
///
/// An error and a non-empty hit list never coexist.
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    hits: Vec<SearchHit>,
    error: Option<String>,
}

impl SearchResults {
    /// Results holding the given hits (possibly none).
    pub fn from_hits(hits: Vec<SearchHit>) -> Self {
        Self { hits, error: None }
    }

    /// Results with no hits and no error.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Results carrying only an error message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            hits: Vec::new(),
            error: Some(message.into()),
        }
    }

    /// True when there are no hits (including the error case).
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// The error message, if the search failed.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Hits in descending relevance order.
    pub fn hits(&self) -> &[SearchHit] {
        &self.hits
    }
}

/// A chunk of lesson text waiting to be embedded and indexed.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub lesson_number: Option<u32>,
    pub content: String,
}

/// Retrieval adapter over the course catalog and content index.
pub struct CourseStore {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    max_results: usize,
    resolve_min_score: Option<f32>,
}

impl CourseStore {
    /// Create a new course store.
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            store,
            embedder,
            max_results: 5,
            resolve_min_score: None,
        }
    }

    /// Set the maximum number of chunks returned per search.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Require a minimum similarity before a fuzzy course match is accepted.
    pub fn with_resolve_min_score(mut self, min_score: Option<f32>) -> Self {
        self.resolve_min_score = min_score;
        self
    }

    /// The underlying vector store.
    pub fn vector_store(&self) -> Arc<dyn VectorStore> {
        self.store.clone()
    }

    /// Map a possibly partial course name to a canonical indexed title.
    ///
    /// An exact title always resolves to itself; otherwise the nearest title
    /// embedding wins.
    #[instrument(skip(self))]
    pub async fn resolve_course_name(&self, name: &str) -> Result<Option<String>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }

        if self.store.get_course(name).await?.is_some() {
            return Ok(Some(name.to_string()));
        }

        let embedding = self.embedder.embed(name).await?;
        let nearest = self.store.nearest_courses(&embedding, 1).await?;

        let resolved = nearest.into_iter().next().and_then(|m| match self.resolve_min_score {
            Some(min) if m.score < min => {
                debug!("Closest course '{}' scored {:.3}, below {:.3}", m.title, m.score, min);
                None
            }
            _ => Some(m.title),
        });

        debug!("Resolved '{}' to {:?}", name, resolved);
        Ok(resolved)
    }

    /// Search content, optionally restricted to a course and lesson.
    ///
    /// Never fails: resolution and backend problems come back as
    /// [`SearchResults::error`].
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
    ) -> SearchResults {
        let course_title = match course_name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => match self.resolve_course_name(name).await {
                Ok(Some(title)) => Some(title),
                Ok(None) => return SearchResults::error(format!("No course found matching '{}'", name)),
                Err(e) => return SearchResults::error(format!("Search error: {}", e)),
            },
            None => None,
        };

        let filter = ChunkFilter {
            course_title,
            lesson_number,
        };

        let embedding = match self.embedder.embed(query).await {
            Ok(embedding) => embedding,
            Err(e) => return SearchResults::error(format!("Search error: {}", e)),
        };

        match self.store.query_chunks(&embedding, &filter, self.max_results).await {
            Ok(matches) => SearchResults::from_hits(
                matches
                    .into_iter()
                    .map(|m| SearchHit {
                        document: m.chunk.content,
                        metadata: m.chunk.metadata,
                        score: m.score,
                    })
                    .collect(),
            ),
            Err(e) => SearchResults::error(format!("Search error: {}", e)),
        }
    }

    /// Link for a lesson of an exactly-named course.
    pub async fn get_lesson_link(&self, course_title: &str, lesson_number: u32) -> Result<Option<String>> {
        let course = self.store.get_course(course_title).await?;
        Ok(course
            .as_ref()
            .and_then(|c| c.lesson(lesson_number))
            .and_then(|l| l.lesson_link.clone()))
    }

    /// Outline metadata for an exactly-named course.
    pub async fn get_course_outline_metadata(&self, course_title: &str) -> Result<Option<CourseMetadata>> {
        self.store.get_course(course_title).await
    }

    /// All indexed course titles, sorted.
    pub async fn get_existing_course_titles(&self) -> Result<Vec<String>> {
        let mut titles = self.store.course_titles().await?;
        titles.sort();
        Ok(titles)
    }

    /// Number of indexed courses.
    pub async fn course_count(&self) -> Result<usize> {
        self.store.course_count().await
    }

    /// Add a course to the catalog, embedding its title for resolution.
    pub async fn add_course_metadata(&self, course: &CourseMetadata) -> Result<()> {
        let embedding = self.embedder.embed(&course.title).await?;
        self.store
            .upsert_course(&CourseRecord {
                metadata: course.clone(),
                embedding,
            })
            .await
    }

    /// Embed and index a course's content chunks.
    pub async fn add_course_content(&self, course_title: &str, chunks: &[NewChunk]) -> Result<usize> {
        if chunks.is_empty() {
            warn!("No content chunks for course '{}'", course_title);
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let records: Vec<ContentChunk> = chunks
            .iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (chunk, embedding))| {
                ContentChunk::new(
                    course_title,
                    chunk.lesson_number,
                    i as u32,
                    chunk.content.clone(),
                    embedding,
                )
            })
            .collect();

        self.store.upsert_chunks(&records).await
    }

    /// Remove a course and its content.
    pub async fn delete_course(&self, course_title: &str) -> Result<usize> {
        self.store.delete_course(course_title).await
    }
}
