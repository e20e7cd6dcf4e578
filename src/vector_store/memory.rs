//! In-memory vector store implementation.
//!
//! Useful for testing and small datasets.

use super::{
    cosine_similarity, rank_chunks, rank_courses, ChunkFilter, ContentChunk, CourseMatch,
    CourseMetadata, CourseRecord, ScoredChunk, VectorStore,
};
use crate::error::{LektorError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// In-memory vector store.
pub struct MemoryVectorStore {
    courses: RwLock<HashMap<String, CourseRecord>>,
    chunks: RwLock<HashMap<Uuid, ContentChunk>>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self {
            courses: RwLock::new(HashMap::new()),
            chunks: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|e| LektorError::VectorStore(format!("Failed to acquire lock: {}", e)))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|e| LektorError::VectorStore(format!("Failed to acquire lock: {}", e)))
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert_course(&self, course: &CourseRecord) -> Result<()> {
        let mut courses = write(&self.courses)?;
        courses.insert(course.metadata.title.clone(), course.clone());
        Ok(())
    }

    async fn upsert_chunks(&self, chunks: &[ContentChunk]) -> Result<usize> {
        let mut store = write(&self.chunks)?;
        for chunk in chunks {
            store.insert(chunk.id, chunk.clone());
        }
        Ok(chunks.len())
    }

    async fn nearest_courses(&self, embedding: &[f32], limit: usize) -> Result<Vec<CourseMatch>> {
        let courses = read(&self.courses)?;

        let matches = courses
            .values()
            .map(|c| CourseMatch {
                title: c.metadata.title.clone(),
                score: cosine_similarity(embedding, &c.embedding),
            })
            .collect();

        Ok(rank_courses(matches, limit))
    }

    async fn query_chunks(
        &self,
        embedding: &[f32],
        filter: &ChunkFilter,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let chunks = read(&self.chunks)?;

        let matches = chunks
            .values()
            .filter(|c| filter.matches(&c.metadata))
            .map(|c| ScoredChunk {
                chunk: c.clone(),
                score: cosine_similarity(embedding, &c.embedding),
            })
            .collect();

        Ok(rank_chunks(matches, limit))
    }

    async fn get_course(&self, title: &str) -> Result<Option<CourseMetadata>> {
        let courses = read(&self.courses)?;
        Ok(courses.get(title).map(|c| c.metadata.clone()))
    }

    async fn course_titles(&self) -> Result<Vec<String>> {
        let courses = read(&self.courses)?;
        Ok(courses.keys().cloned().collect())
    }

    async fn course_count(&self) -> Result<usize> {
        Ok(read(&self.courses)?.len())
    }

    async fn chunk_count(&self) -> Result<usize> {
        Ok(read(&self.chunks)?.len())
    }

    async fn delete_course(&self, title: &str) -> Result<usize> {
        write(&self.courses)?.remove(title);

        let mut chunks = write(&self.chunks)?;
        let initial_len = chunks.len();
        chunks.retain(|_, c| c.metadata.course_title != title);
        Ok(initial_len - chunks.len())
    }

    async fn clear(&self) -> Result<()> {
        write(&self.courses)?.clear();
        write(&self.chunks)?.clear();
        Ok(())
    }
}
