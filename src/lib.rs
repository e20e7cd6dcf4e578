//! Lektor - Course Materials Assistant
//!
//! Answers questions about indexed course materials. A chat model decides
//! when to search lesson content or look up a course outline, and answers
//! come back with citations to the lessons they used.
//!
//! # Architecture
//!
//! - `config` - Settings and prompt templates
//! - `chunking` - Splitting lesson text into chunks
//! - `embedding` - Embedding generation
//! - `vector_store` - Course catalog and content index backends
//! - `rag` - Course retrieval and the question answering system
//! - `agent` - Tools, tool registry, and the bounded generation loop
//! - `session` - Conversation history
//! - `orchestrator` - Component wiring and course ingestion
//!
//! # Example
//!
//! ```rust,no_run
//! use lektor::config::Settings;
//! use lektor::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     orchestrator.index_path("docs/".as_ref(), false).await?;
//!
//!     let rag = orchestrator.rag_system()?;
//!     let response = rag.query("What is covered in lesson 1 of the MCP course?", None).await?;
//!     println!("{}", response.answer);
//!     for source in &response.sources {
//!         println!("- {}", source.text);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod openai;
pub mod orchestrator;
pub mod rag;
pub mod session;
pub mod vector_store;

#[cfg(test)]
mod test_support;

pub use error::{LektorError, Result};
