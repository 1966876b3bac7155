//! Function-calling schema translation
//!
//! Maps tool-server descriptors onto the `{"type": "function", ...}` records a
//! chat-completions endpoint expects. Input schemas pass through unchanged;
//! judging them is the endpoint's job.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tool::ToolDescriptor;

/// Tool entry in a completion request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub function: FunctionDefinition,
}

/// Function signature shown to the model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Translate one descriptor
pub fn translate(tool: &ToolDescriptor) -> FunctionSchema {
    FunctionSchema {
        schema_type: "function".into(),
        function: FunctionDefinition {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.input_schema.clone(),
        },
    }
}

/// Translate a descriptor set, keeping server order
pub fn translate_all(tools: &[ToolDescriptor]) -> Vec<FunctionSchema> {
    tools.iter().map(translate).collect()
}
