//! Router construction and server startup.

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::{auth, chat};
use crate::agent::Agent;
use crate::config::Config;
use crate::llm::GeminiClient;
use crate::records::SqliteRecordStore;
use crate::session::{SessionStore, SqliteSessionStore};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub agent: Arc<Agent>,
    pub sessions: Arc<dyn SessionStore>,
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/api/ai/history", get(chat::history))
        .route(
            "/api/ai/sessions/:id",
            get(chat::get_session).delete(chat::delete_session),
        )
        .route("/api/ai/chat", post(chat::chat))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_auth,
        ));

    Router::new()
        .route("/api/health", get(chat::health))
        .merge(protected)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Open the stores, build the agent and serve until shutdown.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let records = Arc::new(SqliteRecordStore::open(&config.database_path)?);
    let sessions: Arc<dyn SessionStore> =
        Arc::new(SqliteSessionStore::open(&config.database_path)?);
    let llm = Arc::new(GeminiClient::from_config(&config)?);
    tracing::info!(
        model = %llm.model(),
        database = %config.database_path.display(),
        max_iterations = config.max_iterations,
        dev_mode = config.dev_mode,
        "Starting CRM assistant"
    );

    let agent = Arc::new(Agent::new(&config, llm, Arc::clone(&sessions), records));
    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState {
        config,
        agent,
        sessions,
    });

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
