//! Chat and session handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::{Extension, Json};
use uuid::Uuid;

use super::auth::AuthUser;
use super::error::ApiError;
use super::routes::AppState;
use super::types::{ChatRequest, ChatResponse, HealthResponse};
use crate::session::{ChatMessage, SessionSummary};

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        persistent_sessions: state.sessions.is_persistent(),
    })
}

/// The caller's sessions, newest first.
pub async fn history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<SessionSummary>>, ApiError> {
    let sessions = state.sessions.list_for_owner(&user.user).await?;
    Ok(Json(sessions))
}

/// Transcript of one of the caller's sessions.
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    let session = state.sessions.get_owned(id, &user.user).await?;
    Ok(Json(session.messages))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<&'static str>, ApiError> {
    state.sessions.delete_owned(id, &user.user).await?;
    tracing::info!(chat_id = %id, user = %user.user, "Deleted chat session");
    Ok(Json("Deleted"))
}

/// Run one assistant turn.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let chat_id = req.session_id();
    tracing::info!(
        user = %user.user,
        chat_id = ?chat_id,
        message_len = req.message.len(),
        "Received chat message"
    );

    let outcome = state
        .agent
        .chat(&user.user, &req.message, req.history, chat_id)
        .await?;

    Ok(Json(ChatResponse {
        response: outcome.response,
        chat_id: outcome.chat_id,
    }))
}
