//! HTTP Handlers

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use uncover_core::{ClientError, ToolDescriptor};

use crate::state::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub tools: usize,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Caller-chosen correlation id, echoed back and logged. No history is
    /// kept; every request is answered by a fresh run.
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub message: String,
    /// The request's correlation id, or a generated one
    pub conversation_id: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let client = state.client.clone();
    let listed = tokio::task::spawn_blocking(move || client.list_tools()).await;

    let (status, tools) = match listed {
        Ok(Ok(tools)) => ("healthy", tools.len()),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Tool server unavailable");
            ("degraded", 0)
        }
        Err(e) => {
            tracing::error!(error = %e, "Health check task failed");
            ("degraded", 0)
        }
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        tools,
    })
}

/// Tools the server currently advertises
pub async fn list_tools(State(state): State<AppState>) -> Result<Json<Vec<ToolDescriptor>>, ApiError> {
    let client = state.client.clone();
    let tools = tokio::task::spawn_blocking(move || client.list_tools())
        .await
        .map_err(join_error)?
        .map_err(client_error)?;
    Ok(Json(tools))
}

/// Main chat endpoint
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Message must not be empty".into(),
            "EMPTY_MESSAGE",
        ));
    }

    let conversation_id = payload
        .conversation_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    tracing::info!(%conversation_id, "Chat request");

    let client = state.client.clone();
    let query = payload.message;
    let answer = tokio::task::spawn_blocking(move || client.process_query(&query))
        .await
        .map_err(join_error)?
        .map_err(client_error)?;

    Ok(Json(ChatResponse {
        message: answer,
        conversation_id,
    }))
}

// ============================================================================
// Error mapping
// ============================================================================

fn error_response(status: StatusCode, error: String, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error,
            code: code.into(),
        }),
    )
}

fn client_error(e: ClientError) -> ApiError {
    tracing::error!(error = %e, "Client error");
    let code = match &e {
        ClientError::Connection(_) => "CONNECTION_ERROR",
        ClientError::Session(_) => "SESSION_ERROR",
        ClientError::Gateway(_) => "GATEWAY_ERROR",
        ClientError::Config(_) => "CONFIG_ERROR",
        ClientError::WorkerStopped => "CLIENT_STOPPED",
        _ => "CLIENT_ERROR",
    };
    error_response(StatusCode::INTERNAL_SERVER_ERROR, e.user_message(), code)
}

fn join_error(e: tokio::task::JoinError) -> ApiError {
    tracing::error!(error = %e, "Blocking task failed");
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "An unexpected error occurred.".into(),
        "INTERNAL_ERROR",
    )
}
