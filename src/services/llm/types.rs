//! LLM Types
//!
//! Core types for chat-completion interactions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role of a chat participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    /// Wire/storage representation of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }

    /// Parse a stored role string, defaulting unknown values to `User`.
    pub fn from_str_lossy(role: &str) -> Self {
        match role {
            "system" => ChatRole::System,
            "assistant" => ChatRole::Assistant,
            _ => ChatRole::User,
        }
    }
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One turn of a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Errors from the chat endpoint
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("LLM endpoint returned status {0}")]
    Status(u16),

    #[error("could not extract reply from LLM response")]
    InvalidResponse,
}

/// Result type alias for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// Chat-completion seam.
///
/// The analysis translator and the plain chat path both depend on this
/// trait rather than on a concrete client, so tests can substitute a stub.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// One blocking request/response chat completion.
    async fn chat(&self, messages: &[ChatTurn]) -> LlmResult<String>;
}
