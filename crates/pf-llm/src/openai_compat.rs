//! An LLM provider adapter for any OpenAI-compatible chat completions
//! endpoint (OpenAI, Azure OpenAI behind a compatible gateway, Ollama,
//! vLLM, LM Studio, ...). Non-streaming only — the Conductor always
//! waits for the full reply before persisting the assistant Message.

use serde_json::Value;

use pf_domain::tool::{LlmReply, ToolCall, ToolDefinition};

use crate::error::LlmError;
use crate::{GenerateRequest, LlmProvider, Result};

pub struct OpenAiCompatProvider {
    id: String,
    base_url: String,
    api_key: String,
    default_model: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(id: impl Into<String>, base_url: impl Into<String>, api_key: impl Into<String>, default_model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            default_model: default_model.into(),
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(15))
                .build()
                .expect("reqwest client builds with static config"),
        }
    }

    fn build_body(&self, req: &GenerateRequest) -> Value {
        let mut body = serde_json::json!({
            "model": self.default_model,
            "messages": [{ "role": "user", "content": req.prompt }],
        });
        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_openai).collect();
            body["tools"] = Value::Array(tools);
        }
        if let Some(temp) = req.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        if let Some(max) = req.max_tokens {
            body["max_tokens"] = serde_json::json!(max);
        }
        body
    }
}

fn tool_to_openai(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

fn parse_tool_calls(message: &Value) -> Vec<ToolCall> {
    let Some(arr) = message.get("tool_calls").and_then(Value::as_array) else {
        return Vec::new();
    };
    arr.iter()
        .filter_map(|tc| {
            let call_id = tc.get("id")?.as_str()?.to_string();
            let func = tc.get("function")?;
            let tool_name = func.get("name")?.as_str()?.to_string();
            let args_str = func.get("arguments")?.as_str().unwrap_or("{}");
            let arguments: Value = serde_json::from_str(args_str).unwrap_or_default();
            Some(ToolCall {
                call_id,
                tool_name,
                arguments,
            })
        })
        .collect()
}

fn parse_reply(body: &Value) -> Result<LlmReply> {
    let message = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|a| a.first())
        .and_then(|c| c.get("message"))
        .ok_or_else(|| LlmError::Provider {
            provider: "openai_compat".into(),
            message: "no message in response".into(),
        })?;

    let text = message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    Ok(LlmReply {
        text,
        tool_calls: parse_tool_calls(message),
    })
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn generate(&self, req: GenerateRequest) -> Result<LlmReply> {
        let url = format!("{}/chat/completions", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&self.build_body(&req))
            .send()
            .await?
            .error_for_status()?;
        let body: Value = resp.json().await?;
        parse_reply(&body)
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_body_includes_tools_and_sampling_params() {
        let provider = OpenAiCompatProvider::new("p1", "https://api.example.com/v1", "key", "gpt-4o");
        let req = GenerateRequest {
            prompt: "hello".into(),
            tools: vec![ToolDefinition {
                name: "collect_structured_data".into(),
                description: "collect".into(),
                parameters: serde_json::json!({"type": "object"}),
            }],
            temperature: Some(0.7),
            max_tokens: Some(512),
        };
        let body = provider.build_body(&req);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["content"], "hello");
        assert_eq!(body["tools"][0]["function"]["name"], "collect_structured_data");
        assert_eq!(body["temperature"], 0.7);
        assert_eq!(body["max_tokens"], 512);
    }

    #[test]
    fn parse_reply_extracts_text_and_tool_calls() {
        let raw = serde_json::json!({
            "choices": [{
                "message": {
                    "content": "hi there",
                    "tool_calls": [{
                        "id": "call_1",
                        "function": { "name": "collect_structured_data", "arguments": "{\"data\":{}}" }
                    }]
                }
            }]
        });
        let reply = parse_reply(&raw).unwrap();
        assert_eq!(reply.text, "hi there");
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].tool_name, "collect_structured_data");
    }

    #[test]
    fn parse_reply_errors_on_missing_message() {
        let raw = serde_json::json!({ "choices": [] });
        assert!(parse_reply(&raw).is_err());
    }
}
