//! GET /v1/sessions/:session_id/ws — upgrade to the Session Conductor's
//! WebSocket channel.

use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;

use crate::runtime::conductor::handle_conductor_socket;
use crate::state::AppState;

pub async fn conductor_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_conductor_socket(socket, session_id, state))
}
