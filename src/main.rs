//! Leo Chat - Server Entry Point

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use leo_chat::config::AppConfig;
use leo_chat::routes;
use leo_chat::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env();
    info!("chat backend starting up");
    info!("LLM endpoint: {} (model {})", config.ollama_api_url, config.model_name);
    info!("database: {}", config.database_path.display());

    let state = match AppState::new(&config) {
        Ok(state) => state,
        Err(e) => {
            error!("failed to initialize application state: {}", e);
            std::process::exit(1);
        }
    };

    // The analysis server is optional: without it, chat-history questions
    // fall back to direct store queries.
    match state.analysis.start().await {
        Ok(()) => info!("analysis server started - full analysis features available"),
        Err(e) => {
            warn!("analysis server unavailable, running in basic mode: {}", e);
            info!("install Node.js to enable full analysis features (npx mcp-sqlite)");
        }
    }

    let app = routes::router(state.clone());
    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind {}: {}", config.bind_addr, e);
            state.analysis.stop().await;
            std::process::exit(1);
        }
    };
    info!("listening on {}", config.bind_addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("server error: {}", e);
    }

    info!("shutting down");
    state.analysis.stop().await;
    info!("shutdown complete");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", e);
    }
}
