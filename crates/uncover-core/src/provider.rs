//! Completion Gateway
//!
//! Common interface for chat-completion backends. The orchestration loop
//! works exclusively through [`CompletionGateway`], so tests can script the
//! model and deployments can point at any OpenAI-compatible endpoint.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use uncover_core::provider::CompletionGateway;
//!
//! let completion = gateway.complete(conversation.messages(), &schemas).await?;
//! if completion.message.has_tool_calls() {
//!     // dispatch
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::{AssistantMessage, Message};
use crate::schema::FunctionSchema;

/// How the model may use the offered tools
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// The model decides whether to call zero or more tools
    #[default]
    Auto,
    /// Tools are never called
    None,
    /// At least one tool must be called
    Required,
}

impl ToolChoice {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::None => "none",
            Self::Required => "required",
        }
    }
}

/// Response from a completion call
#[derive(Clone, Debug)]
pub struct Completion {
    /// The assistant turn, possibly carrying tool calls
    pub message: AssistantMessage,

    /// Model that generated this response
    pub model: String,

    /// Token usage statistics (if available)
    pub usage: Option<TokenUsage>,

    /// Finish reason
    pub finish_reason: Option<FinishReason>,
}

impl Completion {
    /// Completion without usage metadata
    pub fn new(message: AssistantMessage, model: impl Into<String>) -> Self {
        let finish_reason = if message.has_tool_calls() {
            FinishReason::ToolCalls
        } else {
            FinishReason::Stop
        };
        Self {
            message,
            model: model.into(),
            usage: None,
            finish_reason: Some(finish_reason),
        }
    }
}

/// Token usage statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Reason for completion finishing
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Other(String),
}

impl FinishReason {
    /// Map the endpoint's `finish_reason` string
    pub fn from_wire(reason: &str) -> Self {
        match reason {
            "stop" => Self::Stop,
            "length" => Self::Length,
            "tool_calls" | "function_call" => Self::ToolCalls,
            "content_filter" => Self::ContentFilter,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Strategy trait for completion backends
///
/// Implementations bind the model identifier and tool-choice policy at
/// construction. No retries happen at this layer.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// Generate one assistant turn for the given history and tool set
    async fn complete(&self, messages: &[Message], tools: &[FunctionSchema]) -> Result<Completion>;

    /// Model identifier used for every request
    fn model(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ToolCall;

    #[test]
    fn test_tool_choice_defaults_to_auto() {
        assert_eq!(ToolChoice::default(), ToolChoice::Auto);
        assert_eq!(ToolChoice::default().as_str(), "auto");
    }

    #[test]
    fn test_finish_reason_mapping() {
        assert_eq!(FinishReason::from_wire("tool_calls"), FinishReason::ToolCalls);
        assert_eq!(FinishReason::from_wire("stop"), FinishReason::Stop);
        assert_eq!(
            FinishReason::from_wire("weird"),
            FinishReason::Other("weird".into())
        );
    }

    #[test]
    fn test_completion_infers_finish_reason() {
        let calls = vec![ToolCall::new("c1", "add", r#"{"a": 1, "b": 2}"#)];
        let completion = Completion::new(AssistantMessage::new(None, calls).unwrap(), "gpt-4o");
        assert_eq!(completion.finish_reason, Some(FinishReason::ToolCalls));
    }
}
