//! Application State

use std::sync::Arc;

use uncover_runtime::McpChatClient;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Blocking client; handlers reach it through `spawn_blocking`
    pub client: Arc<McpChatClient>,
}

impl AppState {
    pub fn new(client: McpChatClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}
