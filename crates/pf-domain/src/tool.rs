//! Provider-agnostic shapes for the LLM collaborator interface (spec §1,
//! "out of scope" — consumed only as "given a prompt and tool schemas,
//! return response text plus zero or more tool calls").

use serde::{Deserialize, Serialize};

/// A tool call emitted by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: serde_json::Value,
}

/// A tool definition advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's parameters.
    pub parameters: serde_json::Value,
}

/// The result of one LLM turn: text plus zero or more tool calls.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmReply {
    pub text: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}
