//! Deterministic stand-ins for the embedding API and chat model, plus a
//! seeded course catalog.

use crate::agent::{ChatModel, ChatRequest, ModelTurn, ToolInvocation};
use crate::embedding::Embedder;
use crate::error::{LektorError, Result};
use crate::rag::{CourseStore, NewChunk};
use crate::vector_store::{
    ChunkFilter, ContentChunk, CourseMatch, CourseMetadata, CourseRecord, LessonMetadata,
    MemoryVectorStore, ScoredChunk, VectorStore,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

const KEYWORD_DIMS: usize = 1024;

/// Bag-of-words embedder: one hashed bucket per lowercase word.
pub struct KeywordEmbedder;

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self
    }

    fn bucket(word: &str) -> usize {
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in word.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x100000001b3);
        }
        (hash % KEYWORD_DIMS as u64) as usize
    }

    fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; KEYWORD_DIMS];
        for word in text
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            vector[Self::bucket(&word.to_ascii_lowercase())] += 1.0;
        }
        vector
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
        KEYWORD_DIMS
    }
}

/// Vector store whose every operation fails.
pub struct FailingVectorStore;

fn unavailable<T>() -> Result<T> {
    Err(LektorError::VectorStore("backend unavailable".to_string()))
}

#[async_trait]
impl VectorStore for FailingVectorStore {
    async fn upsert_course(&self, _course: &CourseRecord) -> Result<()> {
        unavailable()
    }

    async fn upsert_chunks(&self, _chunks: &[ContentChunk]) -> Result<usize> {
        unavailable()
    }

    async fn nearest_courses(&self, _embedding: &[f32], _limit: usize) -> Result<Vec<CourseMatch>> {
        unavailable()
    }

    async fn query_chunks(
        &self,
        _embedding: &[f32],
        _filter: &ChunkFilter,
        _limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        unavailable()
    }

    async fn get_course(&self, _title: &str) -> Result<Option<CourseMetadata>> {
        unavailable()
    }

    async fn course_titles(&self) -> Result<Vec<String>> {
        unavailable()
    }

    async fn course_count(&self) -> Result<usize> {
        unavailable()
    }

    async fn chunk_count(&self) -> Result<usize> {
        unavailable()
    }

    async fn delete_course(&self, _title: &str) -> Result<usize> {
        unavailable()
    }

    async fn clear(&self) -> Result<()> {
        unavailable()
    }
}

/// Catalog that always matches one title but holds no metadata for it.
pub struct OrphanedCatalogStore {
    pub title: String,
}

#[async_trait]
impl VectorStore for OrphanedCatalogStore {
    async fn upsert_course(&self, _course: &CourseRecord) -> Result<()> {
        Ok(())
    }

    async fn upsert_chunks(&self, chunks: &[ContentChunk]) -> Result<usize> {
        Ok(chunks.len())
    }

    async fn nearest_courses(&self, _embedding: &[f32], _limit: usize) -> Result<Vec<CourseMatch>> {
        Ok(vec![CourseMatch {
            title: self.title.clone(),
            score: 1.0,
        }])
    }

    async fn query_chunks(
        &self,
        _embedding: &[f32],
        _filter: &ChunkFilter,
        _limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        Ok(Vec::new())
    }

    async fn get_course(&self, _title: &str) -> Result<Option<CourseMetadata>> {
        Ok(None)
    }

    async fn course_titles(&self) -> Result<Vec<String>> {
        Ok(vec![self.title.clone()])
    }

    async fn course_count(&self) -> Result<usize> {
        Ok(1)
    }

    async fn chunk_count(&self) -> Result<usize> {
        Ok(0)
    }

    async fn delete_course(&self, _title: &str) -> Result<usize> {
        Ok(0)
    }

    async fn clear(&self) -> Result<()> {
        Ok(())
    }
}

/// Chat model that replays a fixed script and records every request.
pub struct ScriptedChatModel {
    script: Mutex<VecDeque<ModelTurn>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChatModel {
    pub fn new(script: Vec<ModelTurn>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn complete(&self, request: &ChatRequest) -> Result<ModelTurn> {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LektorError::Agent("script exhausted".to_string()))
    }
}

/// A turn requesting a single tool call.
pub fn tool_use(id: &str, name: &str, arguments: Value) -> ModelTurn {
    ModelTurn::ToolUse {
        text: None,
        calls: vec![ToolInvocation {
            id: id.to_string(),
            name: name.to_string(),
            arguments,
        }],
    }
}

fn lesson(n: u32, title: &str, link: Option<&str>) -> LessonMetadata {
    LessonMetadata {
        lesson_number: n,
        lesson_title: title.to_string(),
        lesson_link: link.map(str::to_string),
    }
}

fn chunk(n: u32, content: &str) -> NewChunk {
    NewChunk {
        lesson_number: Some(n),
        content: content.to_string(),
    }
}

/// Course store over an in-memory index holding two small courses.
pub async fn seeded_course_store() -> CourseStore {
    let store = CourseStore::new(
        Arc::new(MemoryVectorStore::new()),
        Arc::new(KeywordEmbedder::new()),
    );

    let mcp = CourseMetadata {
        title: "Introduction to MCP".to_string(),
        instructor: Some("Elie Schoppik".to_string()),
        course_link: Some("https://example.com/mcp".to_string()),
        lessons: vec![
            lesson(0, "Introduction", Some("https://example.com/mcp/lesson-0")),
            lesson(1, "Why MCP", Some("https://example.com/mcp/lesson-1")),
            lesson(2, "MCP Architecture", Some("https://example.com/mcp/lesson-2")),
        ],
    };
    let computer_use = CourseMetadata {
        title: "Building Towards Computer Use".to_string(),
        instructor: Some("Colt Steele".to_string()),
        course_link: Some("https://example.com/computer-use".to_string()),
        lessons: vec![
            lesson(1, "Overview", Some("https://example.com/computer-use/lesson-1")),
            lesson(2, "Working With Images", None),
        ],
    };

    store.add_course_metadata(&mcp).await.unwrap();
    store
        .add_course_content(
            &mcp.title,
            &[
                chunk(0, "Lesson 0 content: Welcome to the course on the Model Context Protocol."),
                chunk(
                    1,
                    "Lesson 1 content: MCP servers expose tools, resources and prompts to clients over a standard protocol.",
                ),
                chunk(2, "Lesson 2 content: The architecture has hosts, clients and servers."),
            ],
        )
        .await
        .unwrap();

    store.add_course_metadata(&computer_use).await.unwrap();
    store
        .add_course_content(
            &computer_use.title,
            &[
                chunk(1, "Lesson 1 content: Computer use lets a model operate a desktop through screenshots."),
                chunk(2, "Lesson 2 content: Images are sent to the model as base64 encoded content blocks."),
            ],
        )
        .await
        .unwrap();

    store
}
