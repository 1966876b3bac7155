//! Error Types

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client error types
///
/// Only [`ClientError::Gateway`] aborts an orchestration run. Tool-side kinds
/// (`Session`, `RemoteTool`, `ArgumentParse`, `UnknownTool`) are rendered as
/// text and handed back to the model.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Tool server unreachable or handshake rejected
    #[error("Connection error: {0}")]
    Connection(String),

    /// Transport failure on an established tool session
    #[error("Session error: {0}")]
    Session(String),

    /// The remote tool ran and reported a domain failure
    #[error("Tool reported an error: {0}")]
    RemoteTool(String),

    /// Tool-call arguments were not a JSON object
    #[error("Invalid tool arguments: {0}")]
    ArgumentParse(String),

    /// The model asked for a tool the server did not advertise
    #[error("Tool not found: {0}")]
    UnknownTool(String),

    /// Completion endpoint transport or quota failure
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Conversation invariant violated (unanswered or fabricated tool calls)
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Background worker is gone (shut down or panicked)
    #[error("Background worker stopped")]
    WorkerStopped,

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// Whether this error ends the current run instead of being fed back to the model
    pub const fn aborts_run(&self) -> bool {
        matches!(self, Self::Gateway(_))
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Connection(_) => "The tool server is unreachable. Please check that it is running.".into(),
            Self::Session(msg) => format!("The tool server connection failed: {msg}"),
            Self::Gateway(_) => "The AI service is currently unavailable. Please try again.".into(),
            Self::Config(msg) => format!("The client is misconfigured: {msg}"),
            Self::WorkerStopped => "The client has shut down. Please reconnect.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}
