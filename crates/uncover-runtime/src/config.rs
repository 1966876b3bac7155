//! Client Configuration
//!
//! Everything the client needs, read once at bootstrap and passed down
//! explicitly afterwards.

use std::time::Duration;

use uncover_core::orchestrator::OrchestratorConfig;
use uncover_core::{ClientError, Result};

use crate::mcp::McpSessionOptions;
use crate::openai::OpenAiConfig;

/// Default tool server endpoint
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8050/mcp";

/// Full client configuration
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Streamable-HTTP endpoint of the tool server
    pub server_url: String,

    /// Tool session options
    pub session: McpSessionOptions,

    /// Completion endpoint settings, including credentials
    pub openai: OpenAiConfig,

    /// Loop settings
    pub orchestrator: OrchestratorConfig,
}

impl ClientConfig {
    /// Config for `server_url` with default session and loop settings
    pub fn new(server_url: impl Into<String>, openai: OpenAiConfig) -> Self {
        Self {
            server_url: server_url.into(),
            session: McpSessionOptions::default(),
            openai,
            orchestrator: OrchestratorConfig::default(),
        }
    }

    /// Read configuration from the process environment
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `OPENAI_API_KEY` | required |
    /// | `OPENAI_MODEL` | `gpt-4o` |
    /// | `OPENAI_BASE_URL` | `https://api.openai.com/v1` |
    /// | `OPENAI_ORG_ID` | unset |
    /// | `OPENAI_TIMEOUT_SECS` | unset |
    /// | `MCP_SERVER_URL` | `http://localhost:8050/mcp` |
    /// | `MCP_TIMEOUT_SECS` | unset |
    /// | `UNCOVER_MAX_ROUNDS` | `10`, or `unbounded` |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with a custom variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = var("OPENAI_API_KEY")
            .ok_or_else(|| ClientError::Config("OPENAI_API_KEY is not set".into()))?;

        let mut openai = OpenAiConfig {
            api_key,
            organization: var("OPENAI_ORG_ID"),
            timeout: parse_secs("OPENAI_TIMEOUT_SECS", var("OPENAI_TIMEOUT_SECS"))?,
            ..Default::default()
        };
        if let Some(model) = var("OPENAI_MODEL") {
            openai.model = model;
        }
        if let Some(base_url) = var("OPENAI_BASE_URL") {
            openai.base_url = base_url;
        }

        let session = McpSessionOptions {
            timeout: parse_secs("MCP_TIMEOUT_SECS", var("MCP_TIMEOUT_SECS"))?,
            ..Default::default()
        };

        let mut orchestrator = OrchestratorConfig::default();
        if let Some(raw) = var("UNCOVER_MAX_ROUNDS") {
            orchestrator.max_rounds = parse_max_rounds(&raw)?;
        }

        Ok(Self {
            server_url: var("MCP_SERVER_URL").unwrap_or_else(|| DEFAULT_SERVER_URL.into()),
            session,
            openai,
            orchestrator,
        })
    }
}

fn parse_secs(key: &str, raw: Option<String>) -> Result<Option<Duration>> {
    raw.map(|value| {
        value
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| ClientError::Config(format!("{key} must be a whole number of seconds, got '{value}'")))
    })
    .transpose()
}

fn parse_max_rounds(raw: &str) -> Result<Option<usize>> {
    if raw.eq_ignore_ascii_case("unbounded") {
        return Ok(None);
    }
    match raw.parse::<usize>() {
        Ok(0) | Err(_) => Err(ClientError::Config(format!(
            "UNCOVER_MAX_ROUNDS must be a positive integer or 'unbounded', got '{raw}'"
        ))),
        Ok(n) => Ok(Some(n)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-test")])).unwrap();
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.openai.model, "gpt-4o");
        assert_eq!(config.orchestrator.max_rounds, Some(10));
        assert!(config.openai.timeout.is_none());
    }

    #[test]
    fn test_missing_api_key() {
        let err = ClientConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "  ")])).unwrap_err();
        assert!(matches!(err, ClientError::Config(msg) if msg.contains("OPENAI_API_KEY")));
    }

    #[test]
    fn test_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_MODEL", "gpt-4o-mini"),
            ("MCP_SERVER_URL", "http://10.0.0.5:8050/mcp"),
            ("UNCOVER_MAX_ROUNDS", "unbounded"),
            ("MCP_TIMEOUT_SECS", "30"),
        ]))
        .unwrap();
        assert_eq!(config.openai.model, "gpt-4o-mini");
        assert_eq!(config.server_url, "http://10.0.0.5:8050/mcp");
        assert_eq!(config.orchestrator.max_rounds, None);
        assert_eq!(config.session.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_invalid_numbers() {
        for (key, value) in [("UNCOVER_MAX_ROUNDS", "0"), ("UNCOVER_MAX_ROUNDS", "lots"), ("OPENAI_TIMEOUT_SECS", "1.5")] {
            let result = ClientConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-test"), (key, value)]));
            assert!(matches!(result, Err(ClientError::Config(_))), "{key}={value} should be rejected");
        }
    }
}
