//! Session lifecycle endpoints: create a session (the external "create
//! session" call named in spec §3) and fetch one by id.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use pf_domain::trace::TraceEvent;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSessionBody {
    pub user_id: String,
    pub operator_id: String,
}

/// POST /v1/sessions — create a session in the workflow's first phase
/// (lowest `position` in the catalog).
pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionBody>,
) -> impl IntoResponse {
    let Some(initial_phase) = state
        .catalog
        .all_phases()
        .into_iter()
        .min_by_key(|p| p.position)
    else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "workflow catalog has no phases" })),
        )
            .into_response();
    };

    match state
        .store
        .create_session(&body.user_id, &body.operator_id, &initial_phase.id)
        .await
    {
        Ok(session) => {
            TraceEvent::SessionCreated {
                session_id: session.id.clone(),
                workflow_phase: initial_phase.id,
            }
            .emit();
            (StatusCode::CREATED, Json(session)).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// GET /v1/sessions/:session_id
pub async fn get_session(State(state): State<AppState>, Path(session_id): Path<String>) -> impl IntoResponse {
    match state.store.get_session(&session_id).await {
        Ok(Some(session)) => Json(session).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "session not found" })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}
