//! Data Models
//!
//! Request and response bodies for the HTTP API.

use serde::{Deserialize, Serialize};

use crate::storage::{SessionRow, StoredMessage};

/// Incoming chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Assistant reply plus the session it belongs to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
}

/// Freshly created session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
}

/// One message in a conversation history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageHistory {
    pub role: String,
    pub content: String,
    pub timestamp: String,
}

impl From<StoredMessage> for MessageHistory {
    fn from(msg: StoredMessage) -> Self {
        Self {
            role: msg.role,
            content: msg.content,
            timestamp: msg.timestamp,
        }
    }
}

/// Full conversation history of a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationHistory {
    pub session_id: String,
    pub messages: Vec<MessageHistory>,
}

/// Session listing entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub created_at: String,
    pub last_activity: String,
    pub first_message: String,
}

impl From<SessionRow> for SessionInfo {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            created_at: row.created_at,
            last_activity: row.last_activity,
            first_message: row.first_message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_optional_session() {
        let req: ChatRequest = serde_json::from_str(r#"{"message": "hi"}"#).unwrap();
        assert_eq!(req.message, "hi");
        assert!(req.session_id.is_none());

        let req: ChatRequest =
            serde_json::from_str(r#"{"message": "hi", "session_id": "abc"}"#).unwrap();
        assert_eq!(req.session_id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_chat_response_serialization() {
        let resp = ChatResponse {
            response: "hello".to_string(),
            session_id: "abc".to_string(),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["response"], "hello");
        assert_eq!(json["session_id"], "abc");
    }

    #[test]
    fn test_message_history_from_stored() {
        let stored = StoredMessage {
            role: "user".to_string(),
            content: "question".to_string(),
            timestamp: "2025-01-01 00:00:00".to_string(),
        };
        let history: MessageHistory = stored.into();
        assert_eq!(history.role, "user");
        assert_eq!(history.content, "question");
    }
}
