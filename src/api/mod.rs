//! HTTP API for the CRM assistant.
//!
//! ## Endpoints
//!
//! - `GET /api/health` - Health check
//! - `GET /api/ai/history` - The caller's chat sessions
//! - `GET /api/ai/sessions/:id` - Transcript of a session
//! - `DELETE /api/ai/sessions/:id` - Delete a session
//! - `POST /api/ai/chat` - Run one assistant turn

mod auth;
mod chat;
mod error;
mod routes;
pub mod types;

pub use auth::{AuthUser, Claims};
pub use error::ApiError;
pub use routes::{router, serve, AppState};
