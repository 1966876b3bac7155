//! Tool System
//!
//! Remote tools are owned by a tool server and reached through a
//! [`ToolSession`]. The orchestration loop only sees descriptors, calls and
//! invocation results.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::{ClientError, Result};
use crate::schema::{self, FunctionSchema};

/// Tool definition as advertised by the tool server
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to the model)
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,

    /// JSON Schema of the tool's input, passed through untouched
    #[serde(default = "default_input_schema")]
    pub input_schema: Value,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn default_input_schema() -> Value {
    serde_json::json!({ "type": "object" })
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Tool call request from the model
///
/// Serialized in the chat-completions shape:
/// `{"id", "type": "function", "function": {"name", "arguments"}}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireToolCall", from = "WireToolCall")]
pub struct ToolCall {
    /// Opaque, endpoint-assigned call ID
    pub id: String,

    /// Tool to invoke
    pub function_name: String,

    /// Arguments exactly as the model serialized them
    pub arguments_json: String,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        function_name: impl Into<String>,
        arguments_json: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            function_name: function_name.into(),
            arguments_json: arguments_json.into(),
        }
    }

    /// Parse the serialized arguments into a JSON object
    pub fn parse_arguments(&self) -> Result<Map<String, Value>> {
        match serde_json::from_str::<Value>(&self.arguments_json) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(ClientError::ArgumentParse(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
            Err(e) => Err(ClientError::ArgumentParse(e.to_string())),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunction,
}

#[derive(Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn function_kind() -> String {
    "function".into()
}

impl From<ToolCall> for WireToolCall {
    fn from(call: ToolCall) -> Self {
        Self {
            id: call.id,
            kind: function_kind(),
            function: WireFunction {
                name: call.function_name,
                arguments: call.arguments_json,
            },
        }
    }
}

impl From<WireToolCall> for ToolCall {
    fn from(wire: WireToolCall) -> Self {
        Self::new(wire.id, wire.function.name, wire.function.arguments)
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// One block of a tool result
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Audio {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        resource: Value,
    },
    ResourceLink {
        uri: String,
        #[serde(default)]
        name: Option<String>,
    },
    /// Content types this client does not understand
    #[serde(other)]
    Unknown,
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// Result from a remote tool invocation
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocationResult {
    /// Whether the tool itself reported a failure
    #[serde(default)]
    pub is_error: bool,

    /// Ordered content blocks
    #[serde(default)]
    pub content: Vec<ContentPart>,
}

impl ToolInvocationResult {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            is_error: false,
            content: vec![ContentPart::text(text)],
        }
    }

    pub fn failure(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            content: vec![ContentPart::text(text)],
        }
    }

    /// First text block, or `""` when there is none. Later blocks are dropped.
    pub fn first_text(&self) -> &str {
        self.content
            .iter()
            .find_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .unwrap_or_default()
    }
}

/// Connection to a remote tool server
///
/// Implementations perform their handshake before handing out a value, so
/// every method here may assume an initialized session. A remote domain
/// failure is returned as `Ok` with `is_error` set; `Err` means transport.
#[async_trait]
pub trait ToolSession: Send + Sync {
    /// Current tool set advertised by the server
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>>;

    /// Invoke one tool
    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<ToolInvocationResult>;

    /// Tear the session down. Safe to call more than once.
    async fn close(&self) -> Result<()>;
}

/// Snapshot of the tools available to one orchestration run
#[derive(Clone, Debug, Default)]
pub struct ToolCatalog {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolCatalog {
    pub fn new(tools: Vec<ToolDescriptor>) -> Self {
        let index = tools
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i))
            .collect();
        Self { tools, index }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Tool names in server order
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Function-calling schemas for the completion endpoint
    pub fn function_schemas(&self) -> Vec<FunctionSchema> {
        schema::translate_all(&self.tools)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
