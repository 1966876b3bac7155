//! Blocking Client
//!
//! [`McpChatClient`] owns a [`Worker`] and a long-lived tool session, and
//! exposes the orchestration loop as plain blocking calls. Safe to share
//! across threads; concurrent queries are serialized on the worker.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use uncover_core::{
    ClientError, CompletionGateway, Orchestrator, OrchestratorConfig, Result, RunOutcome, ToolDescriptor,
    ToolSession,
};

use crate::config::ClientConfig;
use crate::mcp::{McpHttpSession, McpSessionOptions};
use crate::openai::OpenAiGateway;
use crate::worker::Worker;

const WORKER_NAME: &str = "uncover-worker";

/// Synchronous facade over the orchestration loop
pub struct McpChatClient {
    worker: Worker,
    orchestrator: Arc<Orchestrator>,
    closed: AtomicBool,
}

impl McpChatClient {
    /// Connect to the tool server and build the completion gateway
    ///
    /// The handshake and an initial tool discovery run on the worker before
    /// this returns. On failure the worker is torn down again.
    pub fn connect(config: ClientConfig) -> Result<Self> {
        let ClientConfig {
            server_url,
            session: options,
            openai,
            orchestrator,
        } = config;

        let gateway: Arc<dyn CompletionGateway> = Arc::new(OpenAiGateway::new(openai)?);
        let worker = Worker::spawn(WORKER_NAME)?;

        let connected = worker
            .run(move || open_session(server_url, options))
            .and_then(|inner| inner);

        match connected {
            Ok(session) => Ok(Self::assemble(worker, Arc::new(session), gateway, orchestrator)),
            Err(e) => {
                worker.shutdown();
                Err(e)
            }
        }
    }

    /// Build a client around an already connected session and gateway
    pub fn from_parts(
        session: Arc<dyn ToolSession>,
        gateway: Arc<dyn CompletionGateway>,
        config: OrchestratorConfig,
    ) -> Result<Self> {
        let worker = Worker::spawn(WORKER_NAME)?;
        Ok(Self::assemble(worker, session, gateway, config))
    }

    fn assemble(
        worker: Worker,
        session: Arc<dyn ToolSession>,
        gateway: Arc<dyn CompletionGateway>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            worker,
            orchestrator: Arc::new(Orchestrator::new(session, gateway, config)),
            closed: AtomicBool::new(false),
        }
    }

    /// Answer one query, blocking until the run ends
    pub fn process_query(&self, query: &str) -> Result<String> {
        self.run(query).map(|outcome| outcome.answer)
    }

    /// Like [`McpChatClient::process_query`], with run statistics
    pub fn run(&self, query: &str) -> Result<RunOutcome> {
        self.ensure_open()?;
        let orchestrator = Arc::clone(&self.orchestrator);
        let query = query.to_owned();
        self.worker
            .run(move || async move { orchestrator.run(&query).await })
            .and_then(|inner| inner)
    }

    /// Tools currently advertised by the server
    pub fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        self.ensure_open()?;
        let session = Arc::clone(self.orchestrator.session());
        self.worker
            .run(move || async move { session.list_tools().await })
            .and_then(|inner| inner)
    }

    /// Model identifier the gateway sends
    pub fn model(&self) -> &str {
        self.orchestrator.gateway().model()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close the tool session and stop the worker
    ///
    /// Idempotent; later calls return `Ok` without touching the session.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let session = Arc::clone(self.orchestrator.session());
        let result = self
            .worker
            .run(move || async move { session.close().await })
            .and_then(|inner| inner);
        self.worker.shutdown();
        tracing::info!("Client closed");
        result
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(ClientError::Session("client is closed".into()))
        } else {
            Ok(())
        }
    }
}

/// Handshake plus an initial tool discovery
async fn open_session(server_url: String, options: McpSessionOptions) -> Result<McpHttpSession> {
    let session = McpHttpSession::connect(&server_url, options).await?;
    match session.list_tools().await {
        Ok(tools) => {
            let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
            tracing::info!(count = tools.len(), tools = ?names, "Connected to tool server");
            Ok(session)
        }
        Err(e) => {
            if let Err(close_err) = session.close().await {
                tracing::debug!(error = %close_err, "Closing half-open session failed");
            }
            Err(ClientError::Connection(format!("tool discovery failed: {e}")))
        }
    }
}

impl Drop for McpChatClient {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "Closing client on drop failed");
        }
    }
}
