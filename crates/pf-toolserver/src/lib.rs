//! Tool Server (spec §4.D): the JSON-RPC-reachable home of
//! `collect_structured_data`, the one semantic tool the LLM can call.
//!
//! Reachable both in-process (the Conductor calls `ToolServer` methods
//! directly) and over HTTP via [`handle_request`]. Both entry points
//! share this one implementation — an unknown tool name is always a
//! hard JSON-RPC error, never a silent success.

mod collect;
mod error;
pub mod protocol;

pub use collect::{CollectStructuredDataResult, ToolServer};
pub use error::{Result, ToolServerError};

use serde_json::Value;

use protocol::{
    collect_structured_data_def, JsonRpcRequest, JsonRpcResponse, ToolCallParams,
    ToolCallResult, ToolsListResult, INTERNAL_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND,
};

impl ToolServer {
    /// Dispatch one JSON-RPC request. Used both by the in-process
    /// caller (wrapped in a thin request envelope) and by the external
    /// HTTP endpoint.
    pub async fn handle_request(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        match req.method.as_str() {
            "initialize" => JsonRpcResponse::success(
                req.id,
                serde_json::json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "serverInfo": { "name": "pf-toolserver", "version": env!("CARGO_PKG_VERSION") },
                }),
            ),
            "tools/list" => JsonRpcResponse::success(
                req.id,
                serde_json::to_value(ToolsListResult {
                    tools: vec![collect_structured_data_def()],
                })
                .unwrap_or(Value::Null),
            ),
            "tools/call" => self.handle_tool_call(req).await,
            _ => JsonRpcResponse::failure(req.id, METHOD_NOT_FOUND, format!("method not found: {}", req.method)),
        }
    }

    async fn handle_tool_call(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        let Some(params) = req.params.clone() else {
            return JsonRpcResponse::failure(req.id, INVALID_PARAMS, "missing params");
        };
        let call: ToolCallParams = match serde_json::from_value(params) {
            Ok(c) => c,
            Err(e) => return JsonRpcResponse::failure(req.id, INVALID_PARAMS, e.to_string()),
        };

        if call.name != "collect_structured_data" {
            // The RPC method itself ("tools/call") is valid; it's the
            // *tool name* inside it that's unrecognized, so this is an
            // internal dispatch error, not method_not_found.
            return JsonRpcResponse::failure(
                req.id,
                INTERNAL_ERROR,
                format!("unknown tool: {}", call.name),
            );
        }

        let args = match call.arguments.as_object() {
            Some(o) => o.clone(),
            None => return JsonRpcResponse::failure(req.id, INVALID_PARAMS, "arguments must be an object"),
        };
        let Some(session_id) = args.get("session_id").and_then(Value::as_str) else {
            return JsonRpcResponse::failure(req.id, INVALID_PARAMS, "missing session_id");
        };
        let data = match args.get("data").and_then(Value::as_object) {
            Some(d) => d.clone(),
            None => return JsonRpcResponse::failure(req.id, INVALID_PARAMS, "missing data object"),
        };

        match self.collect_structured_data(session_id, &data).await {
            Ok(result) => {
                let value = serde_json::to_value(&result).unwrap_or(Value::Null);
                JsonRpcResponse::success(
                    req.id,
                    serde_json::to_value(ToolCallResult::ok(&value)).unwrap_or(Value::Null),
                )
            }
            Err(e) => JsonRpcResponse::failure(req.id, INTERNAL_ERROR, e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    const WORKFLOW: &str = r#"
updated_at = "2026-01-01T00:00:00Z"

[[phase]]
id = "A"
position = 0
display_name = "Intro"
type = "conversational"

[[field]]
phase_id = "A"
name = "name"
required = true
"#;

    async fn setup() -> (ToolServer, String) {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(WORKFLOW.as_bytes()).unwrap();
        let catalog = Arc::new(pf_catalog::Catalog::load(f.path()).unwrap());
        let store = pf_store::SessionStore::open_in_memory().await.unwrap();
        let session = store.create_session("u1", "op1", "A").await.unwrap();
        let broadcast = Arc::new(pf_broadcast::Broadcaster::new());
        (ToolServer::new(catalog, store, broadcast), session.id)
    }

    #[tokio::test]
    async fn unknown_method_is_hard_error() {
        let (server, _session_id) = setup().await;
        let req = JsonRpcRequest {
            jsonrpc: "2.0".into(),
            id: serde_json::json!(1),
            method: "bogus/method".into(),
            params: None,
        };
        let resp = server.handle_request(req).await;
        assert_eq!(resp.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_tool_name_is_hard_error_not_structured_result() {
        let (server, session_id) = setup().await;
        let req = JsonRpcRequest {
            jsonrpc: "2.0".into(),
            id: serde_json::json!(2),
            method: "tools/call".into(),
            params: Some(serde_json::json!({
                "name": "delete_everything",
                "arguments": { "session_id": session_id, "data": {} }
            })),
        };
        let resp = server.handle_request(req).await;
        assert!(resp.result.is_none());
        assert_eq!(resp.error.unwrap().code, INTERNAL_ERROR);
    }

    #[tokio::test]
    async fn tools_list_exposes_collect_structured_data() {
        let (server, _session_id) = setup().await;
        let req = JsonRpcRequest {
            jsonrpc: "2.0".into(),
            id: serde_json::json!(3),
            method: "tools/list".into(),
            params: None,
        };
        let resp = server.handle_request(req).await;
        let result: ToolsListResult = serde_json::from_value(resp.result.unwrap()).unwrap();
        assert_eq!(result.tools.len(), 1);
        assert_eq!(result.tools[0].name, "collect_structured_data");
    }

    #[tokio::test]
    async fn tools_call_collects_data_via_rpc() {
        let (server, session_id) = setup().await;
        let req = JsonRpcRequest {
            jsonrpc: "2.0".into(),
            id: serde_json::json!(4),
            method: "tools/call".into(),
            params: Some(serde_json::json!({
                "name": "collect_structured_data",
                "arguments": { "session_id": session_id, "data": { "name": "Alex" } }
            })),
        };
        let resp = server.handle_request(req).await;
        assert!(resp.error.is_none());
        let call_result: ToolCallResult = serde_json::from_value(resp.result.unwrap()).unwrap();
        assert!(!call_result.is_error);
        let inner: Value = serde_json::from_str(&call_result.content[0].text).unwrap();
        assert_eq!(inner["success"], true);
        assert_eq!(inner["requirements_satisfied"][0], "name");
    }
}
