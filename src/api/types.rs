//! API request and response types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::ChatMessage;

/// Request to run one chat turn.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// The user's message
    pub message: String,

    /// Prior transcript, used only when starting a new session
    #[serde(default)]
    pub history: Option<Vec<ChatMessage>>,

    /// Session to continue. Empty or unparseable ids start a new session.
    #[serde(default)]
    pub chat_id: Option<String>,
}

impl ChatRequest {
    pub fn session_id(&self) -> Option<Uuid> {
        let raw = self.chat_id.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        match Uuid::parse_str(raw) {
            Ok(id) => Some(id),
            Err(_) => {
                tracing::warn!(chat_id = %raw, "Ignoring malformed chat id");
                None
            }
        }
    }
}

/// Response to a chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The assistant's answer
    pub response: String,

    /// Session the turn was stored in
    pub chat_id: Option<Uuid>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Whether chat sessions survive a restart
    pub persistent_sessions: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(chat_id: Option<&str>) -> ChatRequest {
        ChatRequest {
            message: "hi".to_string(),
            history: None,
            chat_id: chat_id.map(str::to_string),
        }
    }

    #[test]
    fn session_id_tolerates_blank_and_malformed_ids() {
        assert_eq!(request(None).session_id(), None);
        assert_eq!(request(Some("  ")).session_id(), None);
        assert_eq!(request(Some("not-a-uuid")).session_id(), None);

        let id = Uuid::new_v4();
        assert_eq!(request(Some(&id.to_string())).session_id(), Some(id));
    }

    #[test]
    fn history_decodes_roles() {
        let req: ChatRequest = serde_json::from_str(
            r#"{"message": "next", "history": [{"role": "user", "content": "a"}, {"role": "assistant", "content": "b"}]}"#,
        )
        .expect("decode");
        let history = req.history.expect("history");
        assert_eq!(history, vec![ChatMessage::user("a"), ChatMessage::assistant("b")]);

        let bad = serde_json::from_str::<ChatRequest>(
            r#"{"message": "next", "history": [{"role": "system", "content": "a"}]}"#,
        );
        assert!(bad.is_err());
    }
}
