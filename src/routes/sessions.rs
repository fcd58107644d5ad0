//! Session Endpoints
//!
//! Plain CRUD over the session store.

use axum::extract::{Path, State};
use axum::Json;

use crate::models::{ConversationHistory, SessionInfo, SessionResponse};
use crate::state::AppState;
use crate::utils::error::AppResult;

/// Sessions returned by the listing endpoint
const SESSION_LIST_LIMIT: u32 = 10;

pub async fn create_session(
    State(state): State<AppState>,
) -> AppResult<Json<SessionResponse>> {
    let session_id = state.db.create_session()?;
    Ok(Json(SessionResponse { session_id }))
}

pub async fn list_sessions(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<SessionInfo>>> {
    let sessions = state.db.recent_sessions(SESSION_LIST_LIMIT)?;
    Ok(Json(sessions.into_iter().map(SessionInfo::from).collect()))
}

pub async fn session_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> AppResult<Json<ConversationHistory>> {
    let messages = state.db.conversation_history(&session_id)?;
    Ok(Json(ConversationHistory {
        session_id,
        messages: messages.into_iter().map(Into::into).collect(),
    }))
}
