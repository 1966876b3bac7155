//! Scripted Test Doubles
//!
//! In-memory [`ToolSession`] and [`CompletionGateway`] implementations for
//! tests and demos. Both record what they were asked to do.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{ClientError, Result};
use crate::message::{AssistantMessage, Message};
use crate::provider::{Completion, CompletionGateway};
use crate::schema::FunctionSchema;
use crate::tool::{ToolCall, ToolDescriptor, ToolInvocationResult, ToolSession};

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One scripted gateway reply
#[derive(Clone, Debug)]
pub enum ScriptStep {
    Reply(AssistantMessage),
    Fail(String),
}

impl ScriptStep {
    /// Final text answer
    pub fn text(content: impl Into<String>) -> Self {
        Self::Reply(AssistantMessage::text(content))
    }

    /// Reply requesting tool calls
    ///
    /// # Panics
    /// If the calls carry empty or duplicate IDs.
    #[track_caller]
    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self::Reply(AssistantMessage::new(None, calls).expect("scripted tool calls must have unique ids"))
    }

    /// Transport-level gateway failure
    pub fn fail(reason: impl Into<String>) -> Self {
        Self::Fail(reason.into())
    }
}

/// A completion request as the gateway saw it
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<FunctionSchema>,
}

/// Gateway that replays a fixed script
///
/// Once the script runs out every call fails with [`ClientError::Gateway`].
pub struct ScriptedGateway {
    model: String,
    script: Mutex<VecDeque<ScriptStep>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedGateway {
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self {
            model: "scripted".into(),
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Append more replies to the script
    pub fn push(&self, step: ScriptStep) {
        locked(&self.script).push_back(step);
    }

    /// Every request received so far, oldest first
    pub fn requests(&self) -> Vec<RecordedRequest> {
        locked(&self.requests).clone()
    }

    /// Scripted replies not yet consumed
    pub fn remaining(&self) -> usize {
        locked(&self.script).len()
    }
}

#[async_trait]
impl CompletionGateway for ScriptedGateway {
    async fn complete(&self, messages: &[Message], tools: &[FunctionSchema]) -> Result<Completion> {
        locked(&self.requests).push(RecordedRequest {
            messages: messages.to_vec(),
            tools: tools.to_vec(),
        });

        match locked(&self.script).pop_front() {
            Some(ScriptStep::Reply(message)) => Ok(Completion::new(message, &self.model)),
            Some(ScriptStep::Fail(reason)) => Err(ClientError::Gateway(reason)),
            None => Err(ClientError::Gateway("script exhausted".into())),
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

enum Canned {
    Result(ToolInvocationResult),
    TransportFailure(String),
}

/// A `call_tool` invocation as the session saw it
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedCall {
    pub name: String,
    pub arguments: Map<String, Value>,
}

/// Tool session serving canned results
///
/// Tools without a canned result answer `"<name> ok"`.
pub struct RecordingToolSession {
    tools: Vec<ToolDescriptor>,
    canned: Mutex<HashMap<String, Canned>>,
    listing_failure: Mutex<Option<String>>,
    calls: Mutex<Vec<RecordedCall>>,
    list_count: Mutex<usize>,
    close_count: Mutex<usize>,
}

impl RecordingToolSession {
    pub fn new(tools: Vec<ToolDescriptor>) -> Self {
        Self {
            tools,
            canned: Mutex::new(HashMap::new()),
            listing_failure: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            list_count: Mutex::new(0),
            close_count: Mutex::new(0),
        }
    }

    /// Serve `result` whenever `name` is called
    pub fn with_result(self, name: impl Into<String>, result: ToolInvocationResult) -> Self {
        locked(&self.canned).insert(name.into(), Canned::Result(result));
        self
    }

    /// Fail calls to `name` at the transport level
    pub fn with_transport_failure(self, name: impl Into<String>, reason: impl Into<String>) -> Self {
        locked(&self.canned).insert(name.into(), Canned::TransportFailure(reason.into()));
        self
    }

    /// Fail `list_tools` at the transport level
    pub fn with_listing_failure(self, reason: impl Into<String>) -> Self {
        *locked(&self.listing_failure) = Some(reason.into());
        self
    }

    /// Every `call_tool` received so far, oldest first
    pub fn calls(&self) -> Vec<RecordedCall> {
        locked(&self.calls).clone()
    }

    pub fn list_count(&self) -> usize {
        *locked(&self.list_count)
    }

    pub fn close_count(&self) -> usize {
        *locked(&self.close_count)
    }

    fn ensure_open(&self) -> Result<()> {
        if *locked(&self.close_count) > 0 {
            return Err(ClientError::Session("session closed".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ToolSession for RecordingToolSession {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        self.ensure_open()?;
        *locked(&self.list_count) += 1;
        if let Some(reason) = locked(&self.listing_failure).clone() {
            return Err(ClientError::Session(reason));
        }
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<ToolInvocationResult> {
        self.ensure_open()?;
        locked(&self.calls).push(RecordedCall {
            name: name.to_string(),
            arguments,
        });

        match locked(&self.canned).get(name) {
            Some(Canned::Result(result)) => Ok(result.clone()),
            Some(Canned::TransportFailure(reason)) => Err(ClientError::Session(reason.clone())),
            None => Ok(ToolInvocationResult::success(format!("{name} ok"))),
        }
    }

    async fn close(&self) -> Result<()> {
        *locked(&self.close_count) += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripted_gateway_replays_then_fails() {
        let gateway = ScriptedGateway::new(vec![ScriptStep::text("hi")]);
        let first = gateway.complete(&[Message::user("q")], &[]).await.unwrap();
        assert_eq!(first.message.content(), Some("hi"));
        assert!(gateway.complete(&[], &[]).await.is_err());
        assert_eq!(gateway.requests().len(), 2);
    }

    #[test]
    #[should_panic(expected = "unique ids")]
    fn test_duplicate_scripted_call_ids_panic() {
        let _ = ScriptStep::tool_calls(vec![
            ToolCall::new("c1", "geocode_point", "{}"),
            ToolCall::new("c1", "create_map", "{}"),
        ]);
    }

    #[tokio::test]
    async fn test_recording_session() {
        let session = RecordingToolSession::new(vec![ToolDescriptor::new("add", "Add two numbers", json!({}))])
            .with_result("add", ToolInvocationResult::success("3"));

        let mut args = Map::new();
        args.insert("a".into(), json!(1));
        let result = session.call_tool("add", args).await.unwrap();
        assert_eq!(result.first_text(), "3");
        assert_eq!(session.calls()[0].arguments["a"], 1);

        session.close().await.unwrap();
        assert!(session.list_tools().await.is_err());
    }
}
