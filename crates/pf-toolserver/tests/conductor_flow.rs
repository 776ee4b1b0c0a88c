//! End-to-end exercise of the three-phase conversation scenario: a
//! conversational phase gating on a required field and a minimum turn
//! count, a branching phase whose collected value picks the next phase
//! directly, and a terminal phase that completes the session. Drives
//! everything through `ToolServer::handle_request`, the same entry
//! point the external `/v1/tools/rpc` endpoint and the Conductor's
//! LLM-turn path both use, and asserts the exact outbound event
//! sequence a connected client would observe.

use std::io::Write;
use std::sync::Arc;

use serde_json::{json, Value};

use pf_broadcast::Broadcaster;
use pf_catalog::Catalog;
use pf_domain::model::{Message, MessageRole};
use pf_store::SessionStore;
use pf_toolserver::protocol::JsonRpcRequest;
use pf_toolserver::ToolServer;

const WORKFLOW: &str = r#"
updated_at = "2026-01-01T00:00:00Z"

[[phase]]
id = "intake"
position = 0
display_name = "Intake"
type = "conversational"
minimum_turns = 1

[[phase]]
id = "routing"
position = 1
display_name = "Routing"
type = "conversational"

[[phase]]
id = "deep_dive"
position = 2
display_name = "Deep Dive"
type = "conversational"

[[phase]]
id = "closing"
position = 3
display_name = "Closing"
type = "conversational"

[[field]]
phase_id = "intake"
name = "topic"
required = true

[[field]]
phase_id = "routing"
name = "next_stop"
required = true
schema = { type = "string", enum = ["deep_dive", "closing"] }

[[transition]]
from_phase_id = "intake"
to_phase_id = "routing"
guard = "all_required_present"

[[transition]]
from_phase_id = "routing"
to_phase_id = "closing"
guard = "branching:next_stop"

[[transition]]
from_phase_id = "deep_dive"
to_phase_id = "closing"
guard = "all_required_present"
"#;

fn call_request(id: i64, session_id: &str, data: Value) -> JsonRpcRequest {
    serde_json::from_value(json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {
            "name": "collect_structured_data",
            "arguments": { "session_id": session_id, "data": data },
        }
    }))
    .unwrap()
}

fn tool_result_value(response: &pf_toolserver::protocol::JsonRpcResponse) -> Value {
    let result = response.result.clone().expect("tool call succeeded");
    let text = result["content"][0]["text"].as_str().expect("text content");
    serde_json::from_str(text).expect("structured result parses")
}

async fn setup() -> (Arc<ToolServer>, SessionStore, Arc<Broadcaster>, String) {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(WORKFLOW.as_bytes()).unwrap();
    let catalog = Arc::new(Catalog::load(f.path()).unwrap());
    let store = SessionStore::open_in_memory().await.unwrap();
    let session = store.create_session("client-1", "op-1", "intake").await.unwrap();
    let broadcast = Arc::new(Broadcaster::new());
    let server = Arc::new(ToolServer::new(catalog, store.clone(), broadcast.clone()));
    (server, store, broadcast, session.id)
}

#[tokio::test]
async fn three_phase_scenario_advances_and_completes_via_branching() {
    let (server, store, broadcast, session_id) = setup().await;
    let mut events = broadcast.register(&session_id);

    // intake requires one user turn before it's considered ready, even
    // once its required field is present.
    store
        .append_message(&Message::regular(&session_id, MessageRole::User, "I want to talk about onboarding"))
        .await
        .unwrap();

    let resp = server
        .handle_request(call_request(1, &session_id, json!({ "topic": "onboarding" })))
        .await;
    let result = tool_result_value(&resp);
    assert_eq!(result["ready_to_transition"], true);
    assert_eq!(result["auto_transition_success"], true);
    assert_eq!(result["new_phase"], "routing");

    let phase_transition = events.recv().await.unwrap();
    assert_eq!(phase_transition.event_type, "phase_transition");
    assert_eq!(phase_transition.phase.as_deref(), Some("routing"));
    let session_updated = events.recv().await.unwrap();
    assert_eq!(session_updated.event_type, "session_updated");
    assert_eq!(session_updated.phase.as_deref(), Some("routing"));

    let session = store.get_session(&session_id).await.unwrap().unwrap();
    assert_eq!(session.current_phase_id, "routing");

    // routing's branching field sends us directly to "closing", even
    // though "deep_dive" also exists as a sibling phase in the catalog —
    // the branch value names the destination directly.
    let resp = server
        .handle_request(call_request(2, &session_id, json!({ "next_stop": "closing" })))
        .await;
    let result = tool_result_value(&resp);
    assert_eq!(result["new_phase"], "closing");

    let phase_transition = events.recv().await.unwrap();
    assert_eq!(phase_transition.event_type, "phase_transition");
    assert_eq!(phase_transition.phase.as_deref(), Some("closing"));
    let _session_updated = events.recv().await.unwrap();

    let session = store.get_session(&session_id).await.unwrap().unwrap();
    assert_eq!(session.current_phase_id, "closing");
    assert!(!session.is_terminal());

    // closing has no outgoing transition and no required fields, so an
    // empty call completes the session instead of transitioning again.
    let resp = server.handle_request(call_request(3, &session_id, json!({}))).await;
    let result = tool_result_value(&resp);
    assert_eq!(result["auto_transition_success"], true);
    assert!(result.get("new_phase").is_none());

    let session_completed = events.recv().await.unwrap();
    assert_eq!(session_completed.event_type, "session_completed");
    assert_eq!(session_completed.session_status.as_deref(), Some("completed"));

    let session = store.get_session(&session_id).await.unwrap().unwrap();
    assert!(session.is_terminal());
}

#[tokio::test]
async fn routing_can_send_work_back_through_deep_dive_instead() {
    let (server, store, broadcast, session_id) = setup().await;
    let mut events = broadcast.register(&session_id);

    store
        .append_message(&Message::regular(&session_id, MessageRole::User, "topic please"))
        .await
        .unwrap();
    server
        .handle_request(call_request(1, &session_id, json!({ "topic": "pricing" })))
        .await;
    let _ = events.recv().await.unwrap(); // phase_transition -> routing
    let _ = events.recv().await.unwrap(); // session_updated

    let resp = server
        .handle_request(call_request(2, &session_id, json!({ "next_stop": "deep_dive" })))
        .await;
    let result = tool_result_value(&resp);
    assert_eq!(result["new_phase"], "deep_dive");

    let session = store.get_session(&session_id).await.unwrap().unwrap();
    assert_eq!(session.current_phase_id, "deep_dive");
}

#[tokio::test]
async fn unknown_tool_name_is_a_hard_json_rpc_error() {
    let (server, _store, _broadcast, session_id) = setup().await;
    let req: JsonRpcRequest = serde_json::from_value(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "tools/call",
        "params": {
            "name": "delete_everything",
            "arguments": { "session_id": session_id, "data": {} },
        }
    }))
    .unwrap();

    let resp = server.handle_request(req).await;
    assert!(resp.result.is_none());
    let error = resp.error.unwrap();
    assert_eq!(error.code, pf_toolserver::protocol::INTERNAL_ERROR);
    assert!(error.message.contains("delete_everything"));
}

#[tokio::test]
async fn stalled_intake_reports_missing_requirements_without_transitioning() {
    let (server, _store, broadcast, session_id) = setup().await;
    let mut events = broadcast.register(&session_id);

    // A required field is still missing, so no transition fires and no
    // event is published at all.
    let resp = server
        .handle_request(call_request(1, &session_id, json!({ "unrelated": "value" })))
        .await;
    let result = tool_result_value(&resp);
    assert_eq!(result["ready_to_transition"], false);
    assert_eq!(result["missing_requirements"], json!(["topic"]));

    assert!(events.try_recv().is_err());
}
