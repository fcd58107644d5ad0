//! Database Analysis Manager
//!
//! Supervises the MCP SQLite analysis server and answers natural-language
//! questions about the chat history. Questions flow through an ordered
//! chain of strategies - metadata tools, NL-to-SQL, the canned report via
//! the server, the canned report from the local store - and the first
//! strategy that produces an answer wins. `route` always returns
//! displayable text; no failure escapes to the caller.

pub mod formatter;
pub mod protocol;
pub mod report;
pub mod router;
pub mod translator;
pub mod transport;

pub use protocol::{McpClient, ToolOutcome};
pub use transport::{LauncherCommand, TransportState};

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::services::llm::ChatModel;
use crate::storage::Database;

/// Failures inside the analysis subsystem.
///
/// Everything here is absorbed by the router and advances the fallback
/// chain; nothing is surfaced to HTTP callers.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The launcher executable is not installed
    #[error("analysis server launcher not found on PATH")]
    LauncherMissing,

    /// The server exited during startup or the handshake could not complete
    #[error("analysis server failed to start")]
    StartupFailed,

    /// The initialize response did not carry a result
    #[error("analysis server rejected the initialize handshake")]
    HandshakeRejected,

    /// Stream absent, closed, or timed out
    #[error("analysis server transport is closed")]
    TransportClosed,

    /// Response line was not valid JSON or failed id correlation
    #[error("analysis server returned a malformed response")]
    MalformedResponse,

    /// Tool responded without a result
    #[error("tool call '{0}' failed")]
    ToolCallFailed(String),

    /// No safe SQL statement could be produced for the question
    #[error("could not translate question into SQL")]
    TranslationFailed,
}

/// Answer when the whole fallback chain, including direct store access, has
/// failed.
const ANALYSIS_UNAVAILABLE: &str =
    "Error analyzing chat history. Please try again later.";

/// One strategy in the fallback chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Metadata,
    NlToSql,
    CannedViaServer,
    CannedDirect,
}

/// Strategies in priority order. Later stages assume less: the last one
/// needs nothing but the local store.
const PIPELINE: [Stage; 4] = [
    Stage::Metadata,
    Stage::NlToSql,
    Stage::CannedViaServer,
    Stage::CannedDirect,
];

/// Supervisor for the analysis server plus the question-answering pipeline
pub struct AnalysisManager {
    client: McpClient,
    model: Arc<dyn ChatModel>,
    db: Database,
    launcher: LauncherCommand,
}

impl AnalysisManager {
    pub fn new(db: Database, model: Arc<dyn ChatModel>, launcher: LauncherCommand) -> Self {
        Self {
            client: McpClient::new(),
            model,
            db,
            launcher,
        }
    }

    /// Start the analysis server. Best-effort: a failure leaves the manager
    /// in degraded mode and the rest of the application running.
    pub async fn start(&self) -> Result<(), AnalysisError> {
        self.client.start(&self.launcher).await
    }

    /// Terminate the analysis server. Idempotent; in-flight requests are
    /// not drained.
    pub async fn stop(&self) {
        self.client.stop().await;
    }

    /// Is the analysis server up and initialized?
    pub async fn is_running(&self) -> bool {
        self.client.is_ready().await
    }

    /// Answer a chat-history question.
    ///
    /// Walks the strategy pipeline and returns the first answer produced.
    /// Stage failures are absorbed silently; the caller always receives
    /// displayable text.
    pub async fn route(&self, question: &str) -> String {
        for stage in PIPELINE {
            if let Some(answer) = self.attempt(stage, question).await {
                info!("analysis answered via {:?}", stage);
                return answer;
            }
        }
        error!("analysis fallback chain exhausted");
        ANALYSIS_UNAVAILABLE.to_string()
    }

    async fn attempt(&self, stage: Stage, question: &str) -> Option<String> {
        match stage {
            Stage::Metadata => {
                if !self.is_running().await || !router::is_metadata_query(question) {
                    return None;
                }
                router::handle_metadata(&self.client, question).await
            }
            Stage::NlToSql => {
                if !self.is_running().await {
                    return None;
                }
                translator::execute(self.model.as_ref(), &self.client, question).await
            }
            Stage::CannedViaServer => {
                if !self.is_running().await {
                    return None;
                }
                report::via_server(&self.client).await
            }
            Stage::CannedDirect => match report::direct(&self.db) {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!("direct store analysis failed: {}", e);
                    None
                }
            },
        }
    }
}
