//! LLM Client
//!
//! Chat-completion access behind the `ChatModel` trait. The single
//! implementation speaks the Ollama-compatible `/api/chat` endpoint with
//! non-streaming requests; a streaming-format body is still parsed as a
//! last resort because some proxies ignore `stream: false`.

pub mod types;

pub use types::{ChatModel, ChatRole, ChatTurn, LlmError, LlmResult};

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

/// Chat client for an Ollama-compatible endpoint
pub struct OllamaClient {
    http: reqwest::Client,
    api_url: String,
    model: String,
}

impl OllamaClient {
    /// Create a client for the given endpoint and model.
    pub fn new(api_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into(),
            model: model.into(),
        }
    }

    /// Extract the assistant reply from a response body.
    ///
    /// The normal shape is a single JSON object with `message.content`. If
    /// the body is not one JSON document, it is scanned line by line from
    /// the end for a chat fragment carrying `message.content`.
    fn parse_reply(body: &str) -> LlmResult<String> {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
            if let Some(content) = value
                .get("message")
                .and_then(|m| m.get("content"))
                .and_then(|c| c.as_str())
            {
                return Ok(content.to_string());
            }
        }

        warn!("LLM response was not a single JSON document, trying streaming format");
        for line in body.lines().rev() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(line) {
                if let Some(content) = value
                    .get("message")
                    .and_then(|m| m.get("content"))
                    .and_then(|c| c.as_str())
                {
                    return Ok(content.to_string());
                }
            }
        }

        Err(LlmError::InvalidResponse)
    }
}

#[async_trait]
impl ChatModel for OllamaClient {
    async fn chat(&self, messages: &[ChatTurn]) -> LlmResult<String> {
        debug!("sending chat request to {}", self.api_url);
        let response = self
            .http
            .post(&self.api_url)
            .json(&json!({
                "model": self.model,
                "messages": messages,
                "stream": false,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("LLM endpoint returned status {}", status);
            return Err(LlmError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        Self::parse_reply(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reply_plain_json() {
        let body = r#"{"message": {"role": "assistant", "content": "hello"}}"#;
        assert_eq!(OllamaClient::parse_reply(body).unwrap(), "hello");
    }

    #[test]
    fn test_parse_reply_streaming_fallback() {
        let body = concat!(
            "{\"message\": {\"content\": \"par\"}, \"done\": false}\n",
            "not json at all\n",
            "{\"message\": {\"content\": \"partial answer\"}, \"done\": true}\n",
        );
        assert_eq!(OllamaClient::parse_reply(body).unwrap(), "partial answer");
    }

    #[test]
    fn test_parse_reply_rejects_garbage() {
        let result = OllamaClient::parse_reply("definitely not json");
        assert!(matches!(result, Err(LlmError::InvalidResponse)));
    }

    #[test]
    fn test_parse_reply_skips_trailing_blank_lines() {
        let body = "{\"message\": {\"content\": \"x\"}}\n\n\n";
        assert_eq!(OllamaClient::parse_reply(body).unwrap(), "x");
    }
}
