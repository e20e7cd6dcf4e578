//! Vector store abstraction for Lektor.
//!
//! A backend keeps two indices: a course catalog keyed by course title (used
//! for name resolution and outline metadata) and a content index of embedded
//! lesson chunks filterable by course title and lesson number.

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// Course-level metadata. The title doubles as the catalog primary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseMetadata {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_link: Option<String>,
    #[serde(default)]
    pub lessons: Vec<LessonMetadata>,
}

impl CourseMetadata {
    /// Find a lesson by its number.
    pub fn lesson(&self, lesson_number: u32) -> Option<&LessonMetadata> {
        self.lessons.iter().find(|l| l.lesson_number == lesson_number)
    }
}

/// A lesson within a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonMetadata {
    /// Unique within a course; not necessarily contiguous or zero-based.
    pub lesson_number: u32,
    pub lesson_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson_link: Option<String>,
}

/// A course catalog entry: metadata plus the embedding of its title.
#[derive(Debug, Clone)]
pub struct CourseRecord {
    pub metadata: CourseMetadata,
    pub embedding: Vec<f32>,
}

/// Filterable metadata attached to every content chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub course_title: String,
    pub lesson_number: Option<u32>,
}

/// A span of lesson text stored as one searchable unit.
#[derive(Debug, Clone)]
pub struct ContentChunk {
    pub id: Uuid,
    pub content: String,
    pub metadata: ChunkMetadata,
    /// Position of this chunk within its course.
    pub chunk_index: u32,
    pub embedding: Vec<f32>,
}

impl ContentChunk {
    /// Create a new chunk with a fresh ID.
    pub fn new(
        course_title: &str,
        lesson_number: Option<u32>,
        chunk_index: u32,
        content: String,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            content,
            metadata: ChunkMetadata {
                course_title: course_title.to_string(),
                lesson_number,
            },
            chunk_index,
            embedding,
        }
    }
}

/// Restricts a content query to one course and optionally one lesson.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkFilter {
    pub course_title: Option<String>,
    pub lesson_number: Option<u32>,
}

impl ChunkFilter {
    /// Check whether a chunk's metadata passes this filter.
    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        let course_ok = self
            .course_title
            .as_ref()
            .is_none_or(|title| *title == metadata.course_title);
        let lesson_ok = self
            .lesson_number
            .is_none_or(|n| metadata.lesson_number == Some(n));
        course_ok && lesson_ok
    }
}

/// A catalog hit from course-name resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseMatch {
    pub title: String,
    /// Similarity score (higher is better).
    pub score: f32,
}

/// A content hit with its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: ContentChunk,
    /// Similarity score (higher is better).
    pub score: f32,
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace a course catalog entry.
    async fn upsert_course(&self, course: &CourseRecord) -> Result<()>;

    /// Bulk insert or replace content chunks.
    async fn upsert_chunks(&self, chunks: &[ContentChunk]) -> Result<usize>;

    /// Nearest course titles to an embedding, best first.
    async fn nearest_courses(&self, embedding: &[f32], limit: usize) -> Result<Vec<CourseMatch>>;

    /// Nearest content chunks passing a filter, best first.
    async fn query_chunks(
        &self,
        embedding: &[f32],
        filter: &ChunkFilter,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>>;

    /// Get a course's metadata by exact title.
    async fn get_course(&self, title: &str) -> Result<Option<CourseMetadata>>;

    /// All catalog titles (no ordering guarantee).
    async fn course_titles(&self) -> Result<Vec<String>>;

    /// Number of catalog entries.
    async fn course_count(&self) -> Result<usize>;

    /// Number of content chunks.
    async fn chunk_count(&self) -> Result<usize>;

    /// Remove a course and all its chunks. Returns the number of chunks removed.
    async fn delete_course(&self, title: &str) -> Result<usize>;

    /// Remove everything from both indices.
    async fn clear(&self) -> Result<()>;
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

/// Rank course matches best-first; equal scores fall back to title order so
/// resolution is stable for a given index state.
pub(crate) fn rank_courses(mut matches: Vec<CourseMatch>, limit: usize) -> Vec<CourseMatch> {
    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.title.cmp(&b.title))
    });
    matches.truncate(limit);
    matches
}

/// Rank chunk matches best-first with a stable tie-break on position.
pub(crate) fn rank_chunks(mut matches: Vec<ScoredChunk>, limit: usize) -> Vec<ScoredChunk> {
    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.chunk.metadata.course_title.cmp(&b.chunk.metadata.course_title))
            .then_with(|| a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
    });
    matches.truncate(limit);
    matches
}
