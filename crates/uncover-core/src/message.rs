//! Conversation Messages
//!
//! Closed set of roles with role-specific fields. Constructors validate, so a
//! `Message` that exists is well-formed.

use serde::Serialize;
use std::collections::HashSet;

use crate::error::{ClientError, Result};
use crate::tool::ToolCall;

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User input
    User,
    /// Assistant (model) response
    Assistant,
    /// Tool result answering one tool call
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

/// Assistant turn, optionally requesting tool calls
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AssistantMessage {
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ToolCall>,
}

impl AssistantMessage {
    /// Plain text reply
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// Reply carrying tool calls; call IDs must be non-empty and unique
    pub fn new(content: Option<String>, tool_calls: Vec<ToolCall>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(tool_calls.len());
        for call in &tool_calls {
            if call.id.is_empty() {
                return Err(ClientError::Protocol(format!(
                    "tool call to '{}' has an empty id",
                    call.function_name
                )));
            }
            if !seen.insert(call.id.as_str()) {
                return Err(ClientError::Protocol(format!("duplicate tool call id '{}'", call.id)));
            }
        }
        Ok(Self { content, tool_calls })
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        &self.tool_calls
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Tool result answering exactly one tool call
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ToolMessage {
    tool_call_id: String,
    content: String,
}

impl ToolMessage {
    pub fn new(tool_call_id: impl Into<String>, content: impl Into<String>) -> Result<Self> {
        let tool_call_id = tool_call_id.into();
        if tool_call_id.is_empty() {
            return Err(ClientError::Protocol("tool message without tool_call_id".into()));
        }
        Ok(Self {
            tool_call_id,
            content: content.into(),
        })
    }

    pub fn tool_call_id(&self) -> &str {
        &self.tool_call_id
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// A single message in a conversation
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    User { content: String },
    Assistant(AssistantMessage),
    Tool(ToolMessage),
}

impl Message {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub const fn role(&self) -> Role {
        match self {
            Self::User { .. } => Role::User,
            Self::Assistant(_) => Role::Assistant,
            Self::Tool(_) => Role::Tool,
        }
    }

    /// Text content, if the message has any
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::User { content } => Some(content.as_str()),
            Self::Assistant(msg) => msg.content(),
            Self::Tool(msg) => Some(msg.content()),
        }
    }
}

impl From<AssistantMessage> for Message {
    fn from(msg: AssistantMessage) -> Self {
        Self::Assistant(msg)
    }
}

impl From<ToolMessage> for Message {
    fn from(msg: ToolMessage) -> Self {
        Self::Tool(msg)
    }
}

/// Message history of one orchestration run
///
/// Append-only. Tool messages are accepted only as answers to calls of the
/// latest assistant message, each call answered once, and a new assistant
/// message is refused while any call is still unanswered.
#[derive(Clone, Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    pending: Vec<String>,
}

impl Conversation {
    /// Start a conversation from the user's query
    pub fn seeded(query: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(query)],
            pending: Vec::new(),
        }
    }

    /// Append a model reply
    pub fn push_assistant(&mut self, message: AssistantMessage) -> Result<()> {
        self.ensure_round_complete()?;
        self.pending = message.tool_calls().iter().map(|c| c.id.clone()).collect();
        self.messages.push(message.into());
        Ok(())
    }

    /// Append the answer to one outstanding tool call
    pub fn push_tool_result(&mut self, tool_call_id: &str, content: impl Into<String>) -> Result<()> {
        let pos = self
            .pending
            .iter()
            .position(|id| id == tool_call_id)
            .ok_or_else(|| {
                ClientError::Protocol(format!("no outstanding tool call with id '{tool_call_id}'"))
            })?;
        let message = ToolMessage::new(tool_call_id, content)?;
        self.pending.remove(pos);
        self.messages.push(message.into());
        Ok(())
    }

    /// IDs of tool calls from the latest assistant message still unanswered
    pub fn pending_tool_calls(&self) -> &[String] {
        &self.pending
    }

    /// Fails while the latest assistant message has unanswered tool calls
    pub fn ensure_round_complete(&self) -> Result<()> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            Err(ClientError::Protocol(format!(
                "unanswered tool calls: {}",
                self.pending.join(", ")
            )))
        }
    }

    /// Get all messages
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Get the last message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_calls() -> AssistantMessage {
        AssistantMessage::new(
            None,
            vec![
                ToolCall::new("call_a", "geocode_bbox", r#"{"place": "Minneapolis"}"#),
                ToolCall::new("call_b", "geocode_point", r#"{"place": "Target Field"}"#),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_message_creation() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role(), Role::User);
        assert_eq!(msg.content(), Some("Hello"));
    }

    #[test]
    fn test_assistant_rejects_duplicate_and_empty_ids() {
        let dup = AssistantMessage::new(
            None,
            vec![ToolCall::new("x", "add", "{}"), ToolCall::new("x", "add", "{}")],
        );
        assert!(matches!(dup, Err(ClientError::Protocol(_))));

        let empty = AssistantMessage::new(None, vec![ToolCall::new("", "add", "{}")]);
        assert!(matches!(empty, Err(ClientError::Protocol(_))));

        assert!(ToolMessage::new("", "orphan").is_err());
    }

    #[test]
    fn test_round_answers_out_of_order() {
        let mut conv = Conversation::seeded("map minneapolis");
        conv.push_assistant(two_calls()).unwrap();
        assert_eq!(conv.pending_tool_calls().len(), 2);
        assert!(conv.ensure_round_complete().is_err());

        conv.push_tool_result("call_b", "{\"lat\": 44.98}").unwrap();
        conv.push_tool_result("call_a", "[[44.89, -93.32], [45.05, -93.19]]").unwrap();
        conv.ensure_round_complete().unwrap();

        conv.push_assistant(AssistantMessage::text("Here is your map.")).unwrap();
        assert_eq!(conv.len(), 5);
        assert_eq!(conv.last().unwrap().role(), Role::Assistant);
    }

    #[test]
    fn test_rejects_fabricated_and_repeated_answers() {
        let mut conv = Conversation::seeded("q");
        assert!(conv.push_tool_result("call_a", "too early").is_err());

        conv.push_assistant(two_calls()).unwrap();
        assert!(conv.push_tool_result("call_z", "made up").is_err());
        conv.push_tool_result("call_a", "ok").unwrap();
        assert!(conv.push_tool_result("call_a", "again").is_err());

        // call_b still open
        assert!(conv.push_assistant(AssistantMessage::text("done")).is_err());
        assert_eq!(conv.len(), 3);
    }

    #[test]
    fn test_wire_shape() {
        let msg: Message = two_calls().into();
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "assistant");
        assert_eq!(value["content"], serde_json::Value::Null);
        assert_eq!(value["tool_calls"][0]["type"], "function");
        assert_eq!(value["tool_calls"][0]["function"]["name"], "geocode_bbox");
        assert_eq!(value["tool_calls"][0]["function"]["arguments"], r#"{"place": "Minneapolis"}"#);
        assert_eq!(value["tool_calls"][1]["id"], "call_b");
        assert!(value["tool_calls"][1].get("function_name").is_none());

        let user = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(user, serde_json::json!({ "role": "user", "content": "hi" }));

        let tool: Message = ToolMessage::new("call_a", "ok").unwrap().into();
        let value = serde_json::to_value(&tool).unwrap();
        assert_eq!(value["role"], "tool");
        assert_eq!(value["tool_call_id"], "call_a");
        assert_eq!(value["content"], "ok");
    }
}
