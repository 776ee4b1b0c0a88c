//! The LLM provider external collaborator (spec §1: "out of scope,
//! consumed as given a prompt and tool schemas, return response text
//! plus zero or more tool calls"). A thin trait plus one swappable mock
//! implementation and one real OpenAI-compatible implementation, so
//! the workspace builds and is testable end-to-end with no live
//! network dependency.

mod error;
mod mock;
mod openai_compat;

pub use error::{LlmError, Result};
pub use mock::MockLlmProvider;
pub use openai_compat::OpenAiCompatProvider;

use pf_domain::tool::{LlmReply, ToolDefinition};

/// A provider-agnostic generation request: a fully-assembled prompt
/// plus the tool schemas the model may invoke.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub prompt: String,
    pub tools: Vec<ToolDefinition>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Trait every LLM adapter must implement.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(&self, req: GenerateRequest) -> Result<LlmReply>;

    /// A unique identifier for this provider instance, used in trace events.
    fn provider_id(&self) -> &str;
}
