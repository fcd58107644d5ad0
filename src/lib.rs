//! Leo Chat - Backend Library
//!
//! Chat backend with natural-language analysis of the user's own
//! conversation history. It includes:
//! - The database-analysis manager supervising an MCP SQLite server
//! - NL-to-SQL translation through a local LLM
//! - HTTP routes for chat and session history
//! - SQLite storage for sessions and messages

pub mod config;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod storage;
pub mod utils;

pub use config::AppConfig;
pub use services::analysis::{AnalysisError, AnalysisManager, LauncherCommand};
pub use services::llm::{ChatModel, ChatTurn, LlmError, OllamaClient};
pub use state::AppState;
pub use storage::Database;
pub use utils::error::{AppError, AppResult};
