use serde::{Deserialize, Serialize};

/// Settings for the out-of-scope LLM-provider collaborator (spec §1, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "d_provider")]
    pub ai_provider: String,
    #[serde(default = "d_model")]
    pub ai_model: String,
    #[serde(default = "d_temperature")]
    pub ai_temperature: f32,
    #[serde(default = "d_max_tokens")]
    pub ai_max_tokens: u32,
    /// Base URL for an OpenAI-compatible endpoint. Ignored by the mock
    /// provider.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Request timeout for a single LLM call (spec §5, default 15s).
    #[serde(default = "d_timeout_sec")]
    pub request_timeout_sec: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            ai_provider: d_provider(),
            ai_model: d_model(),
            ai_temperature: d_temperature(),
            ai_max_tokens: d_max_tokens(),
            base_url: None,
            request_timeout_sec: d_timeout_sec(),
        }
    }
}

fn d_provider() -> String {
    "mock".into()
}
fn d_model() -> String {
    "mock-1".into()
}
fn d_temperature() -> f32 {
    0.7
}
fn d_max_tokens() -> u32 {
    1024
}
fn d_timeout_sec() -> u64 {
    15
}
