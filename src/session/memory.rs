//! In-memory session store (non-persistent).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ChatMessage, ChatSession, SessionError, SessionStore, SessionSummary};
use crate::records::now_string;

#[derive(Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, ChatSession>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn is_persistent(&self) -> bool {
        false
    }

    async fn list_for_owner(&self, owner: &str) -> Result<Vec<SessionSummary>, SessionError> {
        let sessions = self.sessions.read().await;
        let mut owned: Vec<&ChatSession> = sessions.values().filter(|s| s.owner == owner).collect();
        owned.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(owned.into_iter().map(SessionSummary::from).collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ChatSession>, SessionError> {
        Ok(self.sessions.read().await.get(&id).cloned())
    }

    async fn create(
        &self,
        owner: &str,
        title: &str,
        messages: &[ChatMessage],
    ) -> Result<ChatSession, SessionError> {
        let now = now_string();
        let session = ChatSession {
            id: Uuid::new_v4(),
            owner: owner.to_string(),
            title: title.to_string(),
            messages: messages.to_vec(),
            created_at: now.clone(),
            updated_at: now,
        };
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        Ok(session)
    }

    async fn append_messages(&self, id: Uuid, messages: &[ChatMessage]) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        session.messages.extend_from_slice(messages);
        session.updated_at = now_string();
        Ok(())
    }

    async fn update_title(&self, id: Uuid, title: &str) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        session.title = title.to_string();
        session.updated_at = now_string();
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, SessionError> {
        Ok(self.sessions.write().await.remove(&id).is_some())
    }
}
