//! CLI command implementations.

mod ask;
mod chat;
mod config;
mod courses;
mod index;
mod outline;
mod serve;

pub use ask::run_ask;
pub use chat::run_chat;
pub use config::run_config;
pub use courses::run_courses;
pub use index::run_index;
pub use outline::run_outline;
pub use serve::run_serve;
