//! RAG (Retrieval-Augmented Generation) for course questions.
//!
//! [`CourseStore`] handles retrieval; [`RagSystem`] ties retrieval, tools,
//! the generation loop and sessions together.

mod response;
mod store;

pub use response::{CourseAnalytics, RagResponse, RagSystem, EMPTY_QUERY_ANSWER};
pub use store::{CourseStore, NewChunk, SearchHit, SearchResults};
