//! Application Configuration
//!
//! Environment-driven configuration with the same variables and defaults the
//! deployment scripts already use. Values are read once at startup.

use std::env;
use std::path::{Path, PathBuf};

use crate::services::analysis::transport::LauncherCommand;

/// Default SQLite database file, relative to the working directory
const DEFAULT_DATABASE_NAME: &str = "chat_history.db";

/// Default Ollama-compatible chat endpoint
const DEFAULT_OLLAMA_API_URL: &str = "http://localhost:11434/api/chat";

/// Default chat model
const DEFAULT_MODEL_NAME: &str = "llama3.1";

/// Default HTTP bind address
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

/// Runtime configuration for the chat backend
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path to the SQLite chat-history database
    pub database_path: PathBuf,
    /// Chat-completion endpoint URL
    pub ollama_api_url: String,
    /// Model name sent with every chat request
    pub model_name: String,
    /// Address the HTTP server binds to
    pub bind_addr: String,
}

impl AppConfig {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            database_path: PathBuf::from(
                env::var("DATABASE_NAME").unwrap_or_else(|_| DEFAULT_DATABASE_NAME.to_string()),
            ),
            ollama_api_url: env::var("OLLAMA_API_URL")
                .unwrap_or_else(|_| DEFAULT_OLLAMA_API_URL.to_string()),
            model_name: env::var("MODEL_NAME").unwrap_or_else(|_| DEFAULT_MODEL_NAME.to_string()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
        }
    }

    /// Command line for the MCP SQLite analysis server.
    ///
    /// The server receives the database path as its only positional argument,
    /// made absolute so the subprocess is independent of our working
    /// directory.
    pub fn analysis_launcher(&self) -> LauncherCommand {
        let db_path = absolute_path(&self.database_path);
        LauncherCommand {
            program: "npx".to_string(),
            args: vec![
                "-y".to_string(),
                "mcp-sqlite".to_string(),
                db_path.to_string_lossy().to_string(),
            ],
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn absolute_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}
