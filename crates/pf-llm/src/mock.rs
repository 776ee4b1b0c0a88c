//! A scriptable in-process provider for tests and offline development.

use std::collections::VecDeque;

use parking_lot::Mutex;
use pf_domain::tool::LlmReply;

use crate::{GenerateRequest, LlmProvider, Result};

/// Returns queued replies in order; once the queue is empty, falls back
/// to an empty-text reply with no tool calls.
pub struct MockLlmProvider {
    id: String,
    queue: Mutex<VecDeque<LlmReply>>,
    prompts_seen: Mutex<Vec<String>>,
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self {
            id: "mock".into(),
            queue: Mutex::new(VecDeque::new()),
            prompts_seen: Mutex::new(Vec::new()),
        }
    }

    /// Push a scripted reply onto the back of the queue.
    pub fn push_reply(&self, reply: LlmReply) {
        self.queue.lock().push_back(reply);
    }

    /// Every prompt `generate` has been called with, in call order.
    pub fn prompts_seen(&self) -> Vec<String> {
        self.prompts_seen.lock().clone()
    }
}

#[async_trait::async_trait]
impl LlmProvider for MockLlmProvider {
    async fn generate(&self, req: GenerateRequest) -> Result<LlmReply> {
        self.prompts_seen.lock().push(req.prompt);
        Ok(self.queue.lock().pop_front().unwrap_or_default())
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pf_domain::tool::ToolCall;

    #[tokio::test]
    async fn returns_queued_replies_in_order() {
        let mock = MockLlmProvider::new();
        mock.push_reply(LlmReply {
            text: "hello".into(),
            tool_calls: vec![],
        });
        mock.push_reply(LlmReply {
            text: "".into(),
            tool_calls: vec![ToolCall {
                call_id: "1".into(),
                tool_name: "collect_structured_data".into(),
                arguments: serde_json::json!({}),
            }],
        });

        let first = mock
            .generate(GenerateRequest {
                prompt: "hi".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(first.text, "hello");

        let second = mock
            .generate(GenerateRequest {
                prompt: "again".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(second.tool_calls.len(), 1);

        assert_eq!(mock.prompts_seen(), vec!["hi".to_string(), "again".to_string()]);
    }

    #[tokio::test]
    async fn empty_queue_falls_back_to_default() {
        let mock = MockLlmProvider::new();
        let reply = mock
            .generate(GenerateRequest {
                prompt: "x".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(reply.text.is_empty());
        assert!(reply.tool_calls.is_empty());
    }
}
