//! Application State
//!
//! Shared state handed to every request handler.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::analysis::AnalysisManager;
use crate::services::llm::{ChatModel, OllamaClient};
use crate::storage::Database;
use crate::utils::error::AppResult;

/// Shared application state. Cheap to clone: everything inside is either a
/// pool or an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub model: Arc<dyn ChatModel>,
    pub analysis: Arc<AnalysisManager>,
}

impl AppState {
    /// Build the full service graph from configuration.
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let db = Database::open(&config.database_path)?;
        let model: Arc<dyn ChatModel> = Arc::new(OllamaClient::new(
            config.ollama_api_url.clone(),
            config.model_name.clone(),
        ));
        let analysis = Arc::new(AnalysisManager::new(
            db.clone(),
            model.clone(),
            config.analysis_launcher(),
        ));

        Ok(Self {
            db,
            model,
            analysis,
        })
    }
}
