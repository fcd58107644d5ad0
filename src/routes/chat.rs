//! Chat Endpoint
//!
//! Receives a user message, persists it, and answers either through the
//! analysis manager (for chat-history questions) or through the chat model
//! with the conversation history replayed.

use axum::extract::State;
use axum::Json;
use tracing::{debug, info};

use crate::models::{ChatRequest, ChatResponse};
use crate::services::analysis::router::is_database_query;
use crate::services::llm::{ChatRole, ChatTurn};
use crate::state::AppState;
use crate::utils::error::AppResult;

/// Appended to every analysis answer so users discover what they can ask.
const ANALYSIS_HINT: &str = "\n\n\
I can analyze your chat history and provide insights like:\n\
- Session statistics and activity trends\n\
- Message patterns and conversation lengths\n\
- Recent activity summaries\n\
- Most active conversations\n\n\
Just ask me questions about your chat data!";

pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> AppResult<Json<ChatResponse>> {
    debug!("chat request, message length {}", req.message.len());

    let session_id = match req.session_id {
        Some(id) => id,
        None => {
            let id = state.db.create_session()?;
            info!("created new session {}", id);
            id
        }
    };

    state.db.save_message(&session_id, "user", &req.message)?;

    let reply = if is_database_query(&req.message) {
        info!("detected chat-history question, routing to analysis");
        let mut answer = state.analysis.route(&req.message).await;
        answer.push_str(ANALYSIS_HINT);
        answer
    } else {
        let history = state.db.conversation_history(&session_id)?;
        let conversation: Vec<ChatTurn> = history
            .iter()
            .map(|msg| ChatTurn {
                role: ChatRole::from_str_lossy(&msg.role),
                content: msg.content.clone(),
            })
            .collect();
        state.model.chat(&conversation).await?
    };

    state.db.save_message(&session_id, "assistant", &reply)?;

    Ok(Json(ChatResponse {
        response: reply,
        session_id,
    }))
}
