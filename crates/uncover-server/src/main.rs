//! uncover HTTP Server
//!
//! Axum-based chat surface over the blocking MCP client.

mod handlers;
mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use uncover_runtime::{ClientConfig, McpChatClient};

use crate::handlers::{chat_handler, health_check, list_tools};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ClientConfig::from_env()?;
    tracing::info!(
        server = %config.server_url,
        model = %config.openai.model,
        max_rounds = ?config.orchestrator.max_rounds,
        "Connecting to tool server"
    );

    // Handshake blocks until the session is up
    let client = tokio::task::spawn_blocking(move || McpChatClient::connect(config)).await??;
    let state = AppState::new(client);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api/tools", get(list_tools))
        .route("/api/chat", post(chat_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("uncover server running on http://{}", addr);
    tracing::info!("  GET  /health     - Health check");
    tracing::info!("  GET  /api/tools  - List remote tools");
    tracing::info!("  POST /api/chat   - Send message");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let client = state.client.clone();
    tokio::task::spawn_blocking(move || client.close()).await??;
    tracing::info!("Shut down cleanly");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for ctrl-c");
    }
    tracing::info!("Shutdown requested");
}
