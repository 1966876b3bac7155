//! MCP Tool Session
//!
//! [`ToolSession`] over `rmcp`'s streamable-HTTP client. rmcp owns the
//! JSON-RPC framing, the handshake, session headers and event streams; this
//! module only maps its model onto the core types.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rmcp::model::{
    CallToolRequestParam, ClientCapabilities, ClientInfo, Content, Implementation, ProtocolVersion, RawContent,
    Tool,
};
use rmcp::service::{Peer, RunningService};
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::{RoleClient, ServiceExt};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use uncover_core::{ClientError, ContentPart, Result, ToolDescriptor, ToolInvocationResult, ToolSession};

type Service = RunningService<RoleClient, ClientInfo>;

/// Handshake and transport options
#[derive(Clone, Debug)]
pub struct McpSessionOptions {
    /// Name reported in `clientInfo`
    pub client_name: String,

    /// Version reported in `clientInfo`
    pub client_version: String,

    /// Per-request timeout; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl Default for McpSessionOptions {
    fn default() -> Self {
        Self {
            client_name: "uncover".into(),
            client_version: env!("CARGO_PKG_VERSION").into(),
            timeout: None,
        }
    }
}

impl McpSessionOptions {
    fn client_info(&self) -> ClientInfo {
        let mut implementation = Implementation::from_build_env();
        implementation.name.clone_from(&self.client_name);
        implementation.version.clone_from(&self.client_version);

        ClientInfo {
            protocol_version: ProtocolVersion::default(),
            capabilities: ClientCapabilities::default(),
            client_info: implementation,
        }
    }
}

/// Initialized session with a remote tool server
pub struct McpHttpSession {
    endpoint: String,
    peer: Peer<RoleClient>,
    service: Mutex<Option<Service>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for McpHttpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpHttpSession")
            .field("endpoint", &self.endpoint)
            .field("server", &self.server_name())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl McpHttpSession {
    /// Open a session: `initialize`, then `notifications/initialized`
    ///
    /// Any failure here is a [`ClientError::Connection`]; no partially
    /// initialized session is ever returned.
    pub async fn connect(address: &str, options: McpSessionOptions) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ClientError::Connection(format!("{address}: {e}")))?;

        let transport =
            StreamableHttpClientTransport::with_client(http, StreamableHttpClientTransportConfig::with_uri(address));
        let service = options
            .client_info()
            .serve(transport)
            .await
            .map_err(|e| ClientError::Connection(format!("{address}: initialize failed: {e}")))?;

        let session = Self {
            endpoint: address.to_string(),
            peer: service.peer().clone(),
            service: Mutex::new(Some(service)),
            closed: AtomicBool::new(false),
        };

        tracing::info!(
            endpoint = %session.endpoint,
            server = session.server_name().unwrap_or("unknown"),
            protocol = ?session.peer.peer_info().map(|info| &info.protocol_version),
            "MCP session established"
        );
        Ok(session)
    }

    /// Name the server reported during the handshake
    pub fn server_name(&self) -> Option<&str> {
        self.peer.peer_info().map(|info| info.server_info.name.as_str())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(ClientError::Session("session is closed".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ToolSession for McpHttpSession {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        self.ensure_open()?;
        let tools = self
            .peer
            .list_all_tools()
            .await
            .map_err(|e| ClientError::Session(format!("tools/list: {e}")))?;

        tracing::debug!(count = tools.len(), "Listed remote tools");
        Ok(tools.into_iter().map(descriptor).collect())
    }

    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<ToolInvocationResult> {
        self.ensure_open()?;
        let result = self
            .peer
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: Some(arguments),
            })
            .await
            .map_err(|e| ClientError::Session(format!("tools/call {name}: {e}")))?;

        let is_error = result.is_error.unwrap_or(false);
        if is_error {
            tracing::warn!(tool = name, "Remote tool reported an error");
        }
        Ok(ToolInvocationResult {
            is_error,
            content: result.content.iter().map(content_part).collect(),
        })
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // Cancelling the service also ends the server-side session
        if let Some(service) = self.service.lock().await.take() {
            match service.cancel().await {
                Ok(reason) => tracing::debug!(?reason, "MCP service stopped"),
                Err(e) => tracing::warn!(error = %e, "MCP service task failed"),
            }
        }

        tracing::info!(endpoint = %self.endpoint, "MCP session closed");
        Ok(())
    }
}

fn descriptor(tool: Tool) -> ToolDescriptor {
    let input_schema = if tool.input_schema.is_empty() {
        serde_json::json!({ "type": "object" })
    } else {
        Value::Object(tool.input_schema.as_ref().clone())
    };
    ToolDescriptor::new(
        tool.name.to_string(),
        tool.description.map(|d| d.to_string()).unwrap_or_default(),
        input_schema,
    )
}

fn content_part(content: &Content) -> ContentPart {
    match &content.raw {
        RawContent::Text(text) => ContentPart::text(text.text.clone()),
        RawContent::Image(image) => ContentPart::Image {
            data: image.data.clone(),
            mime_type: image.mime_type.clone(),
        },
        // Remaining kinds share the MCP wire shape with `ContentPart`
        _ => serde_json::to_value(content)
            .and_then(serde_json::from_value)
            .unwrap_or(ContentPart::Unknown),
    }
}
