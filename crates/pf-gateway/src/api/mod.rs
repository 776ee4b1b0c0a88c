pub mod rpc;
pub mod sessions;
pub mod ws;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/sessions", post(sessions::create_session))
        .route("/v1/sessions/:session_id", get(sessions::get_session))
        .route("/v1/sessions/:session_id/ws", get(ws::conductor_ws))
        .route("/v1/tools/rpc", post(rpc::handle_rpc))
}

async fn health() -> &'static str {
    "ok"
}
