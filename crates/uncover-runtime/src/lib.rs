//! # uncover-runtime
//!
//! Concrete transports for `uncover-core` and a blocking client on top.
//!
//! ## Components
//!
//! - **MCP session**: `rmcp` streamable-HTTP client behind `ToolSession`
//! - **OpenAI gateway**: `/chat/completions` with function calling
//! - **Client**: synchronous facade backed by a dedicated worker thread
//!
//! ## Usage
//!
//! ```rust,ignore
//! use uncover_runtime::{ClientConfig, McpChatClient};
//!
//! let client = McpChatClient::connect(ClientConfig::from_env()?)?;
//! let answer = client.process_query("Where is the Mall of America?")?;
//! client.close()?;
//! ```

pub mod client;
pub mod config;
pub mod mcp;
pub mod openai;
pub mod worker;

pub use client::McpChatClient;
pub use config::ClientConfig;
pub use mcp::{McpHttpSession, McpSessionOptions};
pub use openai::{OpenAiConfig, OpenAiGateway};
pub use worker::Worker;

// Re-export core types for convenience
pub use uncover_core::{ClientError, Result, RunOutcome, Termination, ToolDescriptor};
