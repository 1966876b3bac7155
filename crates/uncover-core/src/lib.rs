//! # uncover-core
//!
//! Tool-calling orchestration between a chat-completions model and a remote
//! tool server.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Orchestrator                            │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────────┐  │
//! │  │ Conversation │  │ ToolSession  │  │ CompletionGateway  │  │
//! │  │ (per run)    │──│ (remote)     │──│ (Strategy)         │  │
//! │  └──────────────┘  └──────────────┘  └────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Concrete sessions and gateways live in `uncover-runtime`; this crate only
//! defines the seams and the loop that drives them.

pub mod error;
pub mod message;
pub mod mock;
pub mod orchestrator;
pub mod provider;
pub mod schema;
pub mod tool;

pub use error::{ClientError, Result};
pub use message::{AssistantMessage, Conversation, Message, Role, ToolMessage};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, OrchestratorConfig, RunOutcome, Termination};
pub use provider::{Completion, CompletionGateway, FinishReason, TokenUsage, ToolChoice};
pub use schema::{FunctionDefinition, FunctionSchema};
pub use tool::{ContentPart, ToolCall, ToolCatalog, ToolDescriptor, ToolInvocationResult, ToolSession};
