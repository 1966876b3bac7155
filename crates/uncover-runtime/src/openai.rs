//! OpenAI Chat Completions Gateway
//!
//! Implementation of [`CompletionGateway`] for the `/chat/completions`
//! endpoint and compatible servers.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uncover_core::{
    AssistantMessage, ClientError, Completion, CompletionGateway, FinishReason, FunctionSchema, Message,
    Result, TokenUsage, ToolCall, ToolChoice,
};

/// Default API base
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// OpenAI gateway configuration
#[derive(Clone)]
pub struct OpenAiConfig {
    /// Bearer token
    pub api_key: String,

    /// Model identifier sent with every request
    pub model: String,

    /// API base, without the `/chat/completions` suffix
    pub base_url: String,

    /// Optional `OpenAI-Organization` header
    pub organization: Option<String>,

    /// Request timeout; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            organization: None,
            timeout: None,
        }
    }
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("organization", &self.organization)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Chat-completions gateway
pub struct OpenAiGateway {
    client: reqwest::Client,
    config: OpenAiConfig,
    tool_choice: ToolChoice,
}

impl OpenAiGateway {
    /// Create from configuration; the model and tool choice are fixed from here on
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(ClientError::Config("OpenAI API key is empty".into()));
        }
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::Config(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            tool_choice: ToolChoice::Auto,
        })
    }

    #[must_use]
    pub const fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = tool_choice;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Convert the first choice of a response to a completion
    fn convert_response(response: ChatResponse, fallback_model: &str) -> Result<Completion> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::Gateway("response contained no choices".into()))?;

        let calls = choice.message.tool_calls.unwrap_or_default();
        let message = AssistantMessage::new(choice.message.content, calls)
            .map_err(|e| ClientError::Gateway(format!("unusable assistant message: {e}")))?;

        let mut completion = Completion::new(message, response.model.unwrap_or_else(|| fallback_model.to_string()));
        completion.usage = response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });
        if let Some(reason) = choice.finish_reason {
            completion.finish_reason = Some(FinishReason::from_wire(&reason));
        }
        Ok(completion)
    }
}

#[async_trait]
impl CompletionGateway for OpenAiGateway {
    async fn complete(&self, messages: &[Message], tools: &[FunctionSchema]) -> Result<Completion> {
        let request = ChatRequest {
            model: &self.config.model,
            messages,
            tools: (!tools.is_empty()).then_some(tools),
            tool_choice: (!tools.is_empty()).then(|| self.tool_choice.as_str()),
        };

        tracing::debug!(
            model = %self.config.model,
            messages = messages.len(),
            tools = tools.len(),
            "Requesting completion"
        );

        let mut builder = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request);
        if let Some(org) = &self.config.organization {
            builder = builder.header("OpenAI-Organization", org);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ClientError::Gateway(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            tracing::warn!(%status, "Completion request rejected");
            return Err(ClientError::Gateway(format!("HTTP {status}: {detail}")));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Gateway(format!("undecodable response: {e}")))?;

        let completion = Self::convert_response(body, &self.config.model)?;
        tracing::debug!(
            finish_reason = ?completion.finish_reason,
            tool_calls = completion.message.tool_calls().len(),
            "Completion received"
        );
        Ok(completion)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [FunctionSchema]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}
