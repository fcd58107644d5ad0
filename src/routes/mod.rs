//! HTTP Routes
//!
//! Thin axum layer over the services: the chat endpoint and plain session
//! CRUD. All analysis complexity lives behind `AnalysisManager`.

pub mod chat;
pub mod sessions;

use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;

use crate::state::AppState;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat::chat))
        .route(
            "/sessions",
            post(sessions::create_session).get(sessions::list_sessions),
        )
        .route("/sessions/:session_id", get(sessions::session_history))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
