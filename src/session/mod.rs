//! Chat session persistence.
//!
//! A chat session belongs to exactly one owner and holds the ordered,
//! append-only transcript of user and assistant messages. Stores expose
//! unchecked primitives plus the ownership-checked [`SessionStore::get_owned`]
//! and [`SessionStore::delete_owned`] used by caller-facing operations.

mod memory;
mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use memory::InMemorySessionStore;
pub use sqlite::SqliteSessionStore;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Chat session {0} not found")]
    NotFound(Uuid),

    #[error("Not authorized")]
    NotAuthorized,

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Session store unavailable: {0}")]
    Unavailable(String),
}

/// Author of a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// A persisted conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub owner: String,
    pub title: String,
    pub messages: Vec<ChatMessage>,
    pub created_at: String,
    pub updated_at: String,
}

/// Row of a caller's chat history listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub title: String,
    pub modified: String,
}

impl From<&ChatSession> for SessionSummary {
    fn from(session: &ChatSession) -> Self {
        Self {
            id: session.id,
            title: session.title.clone(),
            modified: session.updated_at.clone(),
        }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Whether sessions survive a restart.
    fn is_persistent(&self) -> bool;

    /// Sessions owned by `owner`, most recently modified first.
    async fn list_for_owner(&self, owner: &str) -> Result<Vec<SessionSummary>, SessionError>;

    /// Fetch without an ownership check.
    async fn get(&self, id: Uuid) -> Result<Option<ChatSession>, SessionError>;

    async fn create(
        &self,
        owner: &str,
        title: &str,
        messages: &[ChatMessage],
    ) -> Result<ChatSession, SessionError>;

    /// Append to the end of a session's transcript.
    async fn append_messages(&self, id: Uuid, messages: &[ChatMessage]) -> Result<(), SessionError>;

    async fn update_title(&self, id: Uuid, title: &str) -> Result<(), SessionError>;

    /// Remove a session without an ownership check. Returns whether it existed.
    async fn delete(&self, id: Uuid) -> Result<bool, SessionError>;

    /// Fetch a session, failing unless `owner` owns it.
    async fn get_owned(&self, id: Uuid, owner: &str) -> Result<ChatSession, SessionError> {
        let session = self.get(id).await?.ok_or(SessionError::NotFound(id))?;
        if session.owner != owner {
            return Err(SessionError::NotAuthorized);
        }
        Ok(session)
    }

    /// Delete a session, failing unless `owner` owns it.
    async fn delete_owned(&self, id: Uuid, owner: &str) -> Result<(), SessionError> {
        self.get_owned(id, owner).await?;
        if !self.delete(id).await? {
            return Err(SessionError::NotFound(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    async fn stores() -> Vec<Arc<dyn SessionStore>> {
        vec![
            Arc::new(InMemorySessionStore::new()),
            Arc::new(SqliteSessionStore::open_in_memory().expect("open sqlite")),
        ]
    }

    #[tokio::test]
    async fn foreign_sessions_are_rejected() {
        for store in stores().await {
            let session = store
                .create("alice@example.com", "Leads", &[ChatMessage::user("hi")])
                .await
                .expect("create");

            let err = store.get_owned(session.id, "bob@example.com").await.unwrap_err();
            assert!(matches!(err, SessionError::NotAuthorized));

            let err = store.delete_owned(session.id, "bob@example.com").await.unwrap_err();
            assert!(matches!(err, SessionError::NotAuthorized));

            // Still there for the owner.
            let owned = store.get_owned(session.id, "alice@example.com").await.expect("owned");
            assert_eq!(owned.messages, vec![ChatMessage::user("hi")]);

            store
                .delete_owned(session.id, "alice@example.com")
                .await
                .expect("owner delete");
            assert!(matches!(
                store.get_owned(session.id, "alice@example.com").await.unwrap_err(),
                SessionError::NotFound(_)
            ));
        }
    }

    #[tokio::test]
    async fn history_lists_only_own_sessions_newest_first() {
        for store in stores().await {
            let first = store.create("alice", "First", &[]).await.expect("create");
            let second = store.create("alice", "Second", &[]).await.expect("create");
            store.create("bob", "Bob's", &[]).await.expect("create");

            store
                .append_messages(first.id, &[ChatMessage::user("again")])
                .await
                .expect("append");

            let history = store.list_for_owner("alice").await.expect("list");
            let titles: Vec<_> = history.iter().map(|s| s.title.as_str()).collect();
            assert_eq!(titles, vec!["First", "Second"]);
            assert_eq!(history[1].id, second.id);
        }
    }

    #[tokio::test]
    async fn append_and_retitle() {
        for store in stores().await {
            let session = store
                .create("alice", "Draft", &[ChatMessage::user("one"), ChatMessage::assistant("two")])
                .await
                .expect("create");
            store
                .append_messages(session.id, &[ChatMessage::user("three"), ChatMessage::assistant("four")])
                .await
                .expect("append");
            store.update_title(session.id, "Lead review").await.expect("title");

            let loaded = store.get(session.id).await.expect("get").expect("exists");
            let contents: Vec<_> = loaded.messages.iter().map(|m| m.content.as_str()).collect();
            assert_eq!(contents, vec!["one", "two", "three", "four"]);
            assert_eq!(loaded.title, "Lead review");
            assert!(loaded.updated_at >= session.updated_at);

            assert!(matches!(
                store.append_messages(Uuid::new_v4(), &[]).await.unwrap_err(),
                SessionError::NotFound(_)
            ));
        }
    }
}
