//! Orchestration Loop
//!
//! Drives one user query through the model and the remote tools:
//!
//! ```text
//! Init ──► AwaitingModel ──► Terminal
//!               ▲    │
//!               │    ▼
//!          DispatchingTools
//! ```
//!
//! Tool-side failures become tool messages the model can react to. A failed
//! completion call ends the run with an empty answer.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::Instrument;
use uuid::Uuid;

use crate::error::{ClientError, Result};
use crate::message::Conversation;
use crate::provider::CompletionGateway;
use crate::schema::FunctionSchema;
use crate::tool::{ToolCall, ToolCatalog, ToolSession};

/// Default cap on completion rounds per run
pub const DEFAULT_MAX_ROUNDS: usize = 10;

/// Orchestrator configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Maximum completion rounds per run; `None` loops until the model stops
    pub max_rounds: Option<usize>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_rounds: Some(DEFAULT_MAX_ROUNDS),
        }
    }
}

/// Why a run stopped
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Termination {
    /// The model answered without requesting tools
    Completed,
    /// The model still wanted tools when the round cap was hit
    RoundLimit,
    /// The completion endpoint failed; the answer is empty
    GatewayFailed(String),
}

/// Result of one orchestration run
#[derive(Clone, Debug)]
pub struct RunOutcome {
    /// Final assistant text (empty when absent or on gateway failure)
    pub answer: String,

    /// Completion calls made, including a failed one
    pub rounds: usize,

    /// Tool calls that reached the tool session
    pub tool_invocations: usize,

    pub termination: Termination,
}

enum LoopState {
    Init,
    AwaitingModel,
    DispatchingTools(Vec<ToolCall>),
    Terminal(Termination, String),
}

/// The orchestration loop
pub struct Orchestrator {
    session: Arc<dyn ToolSession>,
    gateway: Arc<dyn CompletionGateway>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        session: Arc<dyn ToolSession>,
        gateway: Arc<dyn CompletionGateway>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            session,
            gateway,
            config,
        }
    }

    /// Create with default configuration
    pub fn with_defaults(session: Arc<dyn ToolSession>, gateway: Arc<dyn CompletionGateway>) -> Self {
        Self::new(session, gateway, OrchestratorConfig::default())
    }

    /// Answer a query, returning only the final text
    pub async fn process_query(&self, query: &str) -> Result<String> {
        self.run(query).await.map(|outcome| outcome.answer)
    }

    /// Answer a query with a fresh conversation
    ///
    /// Errors only when the tool list cannot be fetched; every later failure
    /// is reflected in the returned [`RunOutcome`].
    pub async fn run(&self, query: &str) -> Result<RunOutcome> {
        let run_id = Uuid::new_v4();
        self.drive(query)
            .instrument(tracing::info_span!("run", %run_id))
            .await
    }

    async fn drive(&self, query: &str) -> Result<RunOutcome> {
        let mut conversation = Conversation::seeded(query);
        let mut catalog = ToolCatalog::default();
        let mut schemas: Vec<FunctionSchema> = Vec::new();
        let mut rounds = 0;
        let mut tool_invocations = 0;
        let mut state = LoopState::Init;

        loop {
            state = match state {
                LoopState::Init => {
                    catalog = ToolCatalog::new(self.session.list_tools().await?);
                    schemas = catalog.function_schemas();
                    tracing::debug!(tools = catalog.len(), "Tool catalog loaded");
                    LoopState::AwaitingModel
                }

                LoopState::AwaitingModel => {
                    conversation.ensure_round_complete()?;
                    rounds += 1;

                    let message = match self.gateway.complete(conversation.messages(), &schemas).await {
                        Ok(completion) => completion.message,
                        Err(e) => {
                            tracing::error!(round = rounds, error = %e, "Completion failed, abandoning run");
                            state = LoopState::Terminal(Termination::GatewayFailed(e.to_string()), String::new());
                            continue;
                        }
                    };

                    let answer = message.content().unwrap_or_default().to_owned();
                    let calls = message.tool_calls().to_vec();
                    conversation.push_assistant(message)?;

                    if calls.is_empty() {
                        LoopState::Terminal(Termination::Completed, answer)
                    } else if self.config.max_rounds.is_some_and(|max| rounds >= max) {
                        tracing::warn!(
                            round = rounds,
                            pending = calls.len(),
                            "Round limit reached, returning partial answer"
                        );
                        LoopState::Terminal(Termination::RoundLimit, answer)
                    } else {
                        LoopState::DispatchingTools(calls)
                    }
                }

                LoopState::DispatchingTools(calls) => {
                    for call in &calls {
                        let result = match Self::prepare(&catalog, call) {
                            Ok(arguments) => {
                                tool_invocations += 1;
                                self.invoke(call, arguments).await
                            }
                            Err(e) => Err(e),
                        };

                        let content = result.unwrap_or_else(|e| {
                            tracing::warn!(tool = %call.function_name, error = %e, "Tool call failed");
                            format!("Error calling tool {}: {}", call.function_name, e)
                        });
                        conversation.push_tool_result(&call.id, content)?;
                    }
                    LoopState::AwaitingModel
                }

                LoopState::Terminal(termination, answer) => {
                    tracing::info!(rounds, tool_invocations, ?termination, "Run finished");
                    return Ok(RunOutcome {
                        answer,
                        rounds,
                        tool_invocations,
                        termination,
                    });
                }
            };
        }
    }

    /// Checks that must pass before a call may reach the tool session
    fn prepare(catalog: &ToolCatalog, call: &ToolCall) -> Result<Map<String, Value>> {
        if !catalog.contains(&call.function_name) {
            return Err(ClientError::UnknownTool(call.function_name.clone()));
        }
        call.parse_arguments()
    }

    async fn invoke(&self, call: &ToolCall, arguments: Map<String, Value>) -> Result<String> {
        tracing::debug!(tool = %call.function_name, id = %call.id, "Calling tool");

        let result = self.session.call_tool(&call.function_name, arguments).await?;
        if result.is_error {
            return Err(ClientError::RemoteTool(result.first_text().to_owned()));
        }
        Ok(result.first_text().to_owned())
    }

    pub fn session(&self) -> &Arc<dyn ToolSession> {
        &self.session
    }

    pub fn gateway(&self) -> &Arc<dyn CompletionGateway> {
        &self.gateway
    }

    /// Get configuration
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }
}

/// Builder for Orchestrator configuration
#[derive(Default)]
pub struct OrchestratorBuilder {
    session: Option<Arc<dyn ToolSession>>,
    gateway: Option<Arc<dyn CompletionGateway>>,
    config: OrchestratorConfig,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(mut self, session: Arc<dyn ToolSession>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn gateway(mut self, gateway: Arc<dyn CompletionGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn max_rounds(mut self, max: Option<usize>) -> Self {
        self.config.max_rounds = max;
        self
    }

    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Orchestrator> {
        let session = self
            .session
            .ok_or_else(|| ClientError::Config("Tool session is required".into()))?;
        let gateway = self
            .gateway
            .ok_or_else(|| ClientError::Config("Completion gateway is required".into()))?;

        Ok(Orchestrator::new(session, gateway, self.config))
    }
}
