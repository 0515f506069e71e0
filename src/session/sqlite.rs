//! SQLite-backed session store.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{ChatMessage, ChatSession, SessionError, SessionStore, SessionSummary};
use crate::records::now_string;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS chat_sessions (
    id         TEXT PRIMARY KEY,
    owner      TEXT NOT NULL,
    title      TEXT NOT NULL,
    messages   TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_chat_sessions_owner ON chat_sessions (owner, updated_at);
"#;

#[derive(Clone)]
pub struct SqliteSessionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSessionStore {
    pub fn open(path: &Path) -> Result<Self, SessionError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, SessionError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, SessionError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, SessionError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, SessionError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            f(&mut conn)
        })
        .await
        .map_err(|e| SessionError::Unavailable(e.to_string()))?
    }
}

/// Raw row: id, owner, title, messages JSON, created_at, updated_at.
type SessionRow = (String, String, String, String, String, String);

fn read_row(row: &Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn decode(row: SessionRow) -> Result<ChatSession, SessionError> {
    let (id, owner, title, messages, created_at, updated_at) = row;
    let id = Uuid::parse_str(&id).map_err(|e| {
        SessionError::Storage(rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(e),
        ))
    })?;
    Ok(ChatSession {
        id,
        owner,
        title,
        messages: serde_json::from_str(&messages)?,
        created_at,
        updated_at,
    })
}

fn load(conn: &Connection, id: Uuid) -> Result<Option<ChatSession>, SessionError> {
    conn.query_row(
        "SELECT id, owner, title, messages, created_at, updated_at
         FROM chat_sessions WHERE id = ?1",
        params![id.to_string()],
        read_row,
    )
    .optional()?
    .map(decode)
    .transpose()
}

fn list_summaries(conn: &Connection, owner: &str) -> Result<Vec<SessionSummary>, SessionError> {
    let mut stmt = conn.prepare(
        "SELECT id, title, updated_at FROM chat_sessions
         WHERE owner = ?1 ORDER BY updated_at DESC",
    )?;
    let rows = stmt.query_map(params![owner], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut summaries = Vec::new();
    for row in rows {
        let (id, title, modified) = row?;
        match Uuid::parse_str(&id) {
            Ok(id) => summaries.push(SessionSummary { id, title, modified }),
            Err(e) => tracing::warn!(id = %id, error = %e, "Skipping chat session with invalid id"),
        }
    }
    Ok(summaries)
}

fn insert_session(conn: &Connection, session: &ChatSession) -> Result<(), SessionError> {
    conn.execute(
        "INSERT INTO chat_sessions (id, owner, title, messages, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            session.id.to_string(),
            session.owner,
            session.title,
            serde_json::to_string(&session.messages)?,
            session.created_at,
            session.updated_at,
        ],
    )?;
    Ok(())
}

/// Append under a transaction so concurrent turns never drop messages.
fn append(conn: &mut Connection, id: Uuid, messages: &[ChatMessage]) -> Result<(), SessionError> {
    let tx = conn.transaction()?;
    let mut session = load(&tx, id)?.ok_or(SessionError::NotFound(id))?;
    session.messages.extend_from_slice(messages);
    tx.execute(
        "UPDATE chat_sessions SET messages = ?1, updated_at = ?2 WHERE id = ?3",
        params![serde_json::to_string(&session.messages)?, now_string(), id.to_string()],
    )?;
    tx.commit()?;
    Ok(())
}

fn retitle(conn: &Connection, id: Uuid, title: &str) -> Result<(), SessionError> {
    let changed = conn.execute(
        "UPDATE chat_sessions SET title = ?1, updated_at = ?2 WHERE id = ?3",
        params![title, now_string(), id.to_string()],
    )?;
    if changed == 0 {
        return Err(SessionError::NotFound(id));
    }
    Ok(())
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    fn is_persistent(&self) -> bool {
        true
    }

    async fn list_for_owner(&self, owner: &str) -> Result<Vec<SessionSummary>, SessionError> {
        let owner = owner.to_string();
        self.with_conn(move |conn| list_summaries(conn, &owner)).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<ChatSession>, SessionError> {
        self.with_conn(move |conn| load(conn, id)).await
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
        self.with_conn(move |conn| {
            insert_session(conn, &session)?;
            Ok(session)
        })
        .await
    }

    async fn append_messages(&self, id: Uuid, messages: &[ChatMessage]) -> Result<(), SessionError> {
        let messages = messages.to_vec();
        self.with_conn(move |conn| append(conn, id, &messages)).await
    }

    async fn update_title(&self, id: Uuid, title: &str) -> Result<(), SessionError> {
        let title = title.to_string();
        self.with_conn(move |conn| retitle(conn, id, &title)).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, SessionError> {
        self.with_conn(move |conn| {
            let removed = conn.execute(
                "DELETE FROM chat_sessions WHERE id = ?1",
                params![id.to_string()],
            )?;
            Ok(removed > 0)
        })
        .await
    }
}
