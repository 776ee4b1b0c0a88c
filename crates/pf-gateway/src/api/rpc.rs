//! POST /v1/tools/rpc — the external JSON-RPC tool-protocol endpoint
//! (spec §6). The same handler an LLM provider's MCP client would talk
//! to; in-process calls from the Conductor go through
//! `ToolServer::handle_request` directly instead.

use axum::extract::State;
use axum::response::{IntoResponse, Json};

use pf_toolserver::protocol::JsonRpcRequest;

use crate::state::AppState;

pub async fn handle_rpc(State(state): State<AppState>, Json(req): Json<JsonRpcRequest>) -> impl IntoResponse {
    Json(state.tools.handle_request(req).await)
}
