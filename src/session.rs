//! Conversation sessions.
//!
//! A session keeps the most recent exchanges of one conversation so follow-up
//! questions can be answered in context. History is capped at `max_history`
//! turns; older ones are dropped first.

use crate::error::{LektorError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

/// Who said something.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message of a past exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Trait for session storage.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Start a new session and return its id.
    async fn create_session(&self) -> Result<String>;

    /// Turns of a session, oldest first. Unknown ids have no history.
    async fn history(&self, session_id: &str) -> Result<Vec<ConversationTurn>>;

    /// Append one turn, creating the session if needed.
    async fn append(&self, session_id: &str, role: Role, content: &str) -> Result<()>;

    /// Append a user question and the assistant's answer.
    async fn append_exchange(&self, session_id: &str, question: &str, answer: &str) -> Result<()> {
        self.append(session_id, Role::User, question).await?;
        self.append(session_id, Role::Assistant, answer).await
    }

    /// Forget a session's history.
    async fn clear(&self, session_id: &str) -> Result<()>;
}

/// Process-local session store.
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, VecDeque<ConversationTurn>>>,
    max_history: usize,
}

impl MemorySessionStore {
    /// Create a store keeping at most `max_history` turns per session.
    pub fn new(max_history: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_history,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, VecDeque<ConversationTurn>>>> {
        self.sessions
            .lock()
            .map_err(|e| LektorError::Session(format!("Failed to acquire lock: {}", e)))
    }

    fn push(&self, turns: &mut VecDeque<ConversationTurn>, turn: ConversationTurn) {
        turns.push_back(turn);
        while turns.len() > self.max_history {
            turns.pop_front();
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_session(&self) -> Result<String> {
        let id = format!("session_{}", Uuid::new_v4().simple());
        self.lock()?.insert(id.clone(), VecDeque::new());
        debug!("Created session {}", id);
        Ok(id)
    }

    async fn history(&self, session_id: &str) -> Result<Vec<ConversationTurn>> {
        Ok(self
            .lock()?
            .get(session_id)
            .map(|turns| turns.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn append(&self, session_id: &str, role: Role, content: &str) -> Result<()> {
        let mut sessions = self.lock()?;
        let turns = sessions.entry(session_id.to_string()).or_default();
        self.push(turns, ConversationTurn {
            role,
            content: content.to_string(),
        });
        Ok(())
    }

    async fn append_exchange(&self, session_id: &str, question: &str, answer: &str) -> Result<()> {
        let mut sessions = self.lock()?;
        let turns = sessions.entry(session_id.to_string()).or_default();
        self.push(turns, ConversationTurn::user(question));
        self.push(turns, ConversationTurn::assistant(answer));
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> Result<()> {
        self.lock()?.remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sessions_are_unique_and_start_empty() {
        let store = MemorySessionStore::new(2);
        let a = store.create_session().await.unwrap();
        let b = store.create_session().await.unwrap();

        assert_ne!(a, b);
        assert!(a.starts_with("session_"));
        assert!(store.history(&a).await.unwrap().is_empty());
        assert!(store.history("unknown").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_keeps_latest_turns() {
        let store = MemorySessionStore::new(4);
        let id = store.create_session().await.unwrap();

        for i in 1..=3 {
            store
                .append_exchange(&id, &format!("q{}", i), &format!("a{}", i))
                .await
                .unwrap();
        }

        let history = store.history(&id).await.unwrap();
        assert_eq!(
            history,
            vec![
                ConversationTurn::user("q2"),
                ConversationTurn::assistant("a2"),
                ConversationTurn::user("q3"),
                ConversationTurn::assistant("a3"),
            ]
        );
    }

    #[tokio::test]
    async fn test_append_single_turns_and_clear() {
        let store = MemorySessionStore::new(2);
        store.append("s", Role::User, "hello").await.unwrap();
        store.append("s", Role::Assistant, "hi").await.unwrap();
        store.append("s", Role::User, "again").await.unwrap();

        let history = store.history("s").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], ConversationTurn::assistant("hi"));

        store.clear("s").await.unwrap();
        assert!(store.history("s").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_never_exceeds_turn_cap() {
        let store = MemorySessionStore::new(2);
        for i in 0..5 {
            store
                .append_exchange("s", &format!("q{}", i), &format!("a{}", i))
                .await
                .unwrap();
            assert!(store.history("s").await.unwrap().len() <= 2);
        }
        assert_eq!(
            store.history("s").await.unwrap(),
            vec![ConversationTurn::user("q4"), ConversationTurn::assistant("a4")]
        );

        let store = MemorySessionStore::new(3);
        store.append_exchange("t", "q1", "a1").await.unwrap();
        store.append_exchange("t", "q2", "a2").await.unwrap();
        assert_eq!(
            store.history("t").await.unwrap(),
            vec![
                ConversationTurn::assistant("a1"),
                ConversationTurn::user("q2"),
                ConversationTurn::assistant("a2"),
            ]
        );
    }

    #[tokio::test]
    async fn test_default_settings_keep_two_exchanges() {
        let settings = crate::config::Settings::default();
        let store = MemorySessionStore::new(settings.session.max_history);
        for i in 0..3 {
            store
                .append_exchange("s", &format!("q{}", i), &format!("a{}", i))
                .await
                .unwrap();
        }

        let history = store.history("s").await.unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0], ConversationTurn::user("q1"));
    }

    #[tokio::test]
    async fn test_zero_history_keeps_nothing() {
        let store = MemorySessionStore::new(0);
        store.append_exchange("s", "q", "a").await.unwrap();
        assert!(store.history("s").await.unwrap().is_empty());
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), r#""assistant""#);
    }
}
