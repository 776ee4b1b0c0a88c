//! Session Conductor (spec §4.E): one instance per connected client,
//! scoped to a single session id. Owns the per-second timer, the
//! inactivity monitor, the timed-waiting countdown, and the inbound
//! frame dispatch that turns a `message` frame into an LLM turn.
//!
//! The Conductor never writes to the socket directly — every outbound
//! frame goes through the [`Broadcaster`], same as the Tool Server, so
//! ordering across producers is governed by one channel per session.

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{Map, Value};

use pf_domain::event::{OutboundEvent, PhaseFieldSummary, PhaseSummary};
use pf_domain::model::{Message as PfMessage, MessageRole, Phase, PhaseType, SessionStatus, ToolCallStatus};
use pf_domain::tool::ToolDefinition;
use pf_domain::trace::TraceEvent;
use pf_llm::GenerateRequest;
use pf_toolserver::protocol::{collect_structured_data_def, JsonRpcRequest, JsonRpcResponse};

use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Per-session runtime state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
struct WaitingState {
    total_seconds: u32,
    remaining_seconds: u32,
}

/// Everything the Conductor tracks for one connected session that
/// isn't already durable in the store: timer accumulators, pause
/// state, and the timed-wait countdown.
#[derive(Debug, Clone)]
pub struct SessionRuntime {
    paused: bool,
    current_phase_id: String,
    /// The "pre-session" phase (catalog position 0) never runs the
    /// timer — it starts on the first transition out of it (spec §9).
    timer_active: bool,
    session_elapsed_seconds: u64,
    phase_elapsed_seconds: u64,
    waiting: Option<WaitingState>,
    last_inbound_at: DateTime<Utc>,
}

impl SessionRuntime {
    fn new(phase: &Phase) -> Self {
        Self {
            paused: false,
            current_phase_id: phase.id.clone(),
            timer_active: phase.position != 0,
            session_elapsed_seconds: 0,
            phase_elapsed_seconds: 0,
            waiting: None,
            last_inbound_at: Utc::now(),
        }
    }
}

/// Registry of live Conductor sessions, mirroring the shape of the
/// node registry this crate's ambient stack was grounded on: one lock
/// guarding a map, keyed by session id.
#[derive(Default)]
pub struct ConductorRegistry {
    sessions: RwLock<HashMap<String, SessionRuntime>>,
}

impl ConductorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, session_id: &str, phase: &Phase) {
        self.sessions
            .write()
            .insert(session_id.to_owned(), SessionRuntime::new(phase));
    }

    fn remove(&self, session_id: &str) {
        self.sessions.write().remove(session_id);
    }

    fn touch_inbound(&self, session_id: &str) {
        if let Some(rt) = self.sessions.write().get_mut(session_id) {
            rt.last_inbound_at = Utc::now();
        }
    }

    fn set_paused(&self, session_id: &str, paused: bool) {
        if let Some(rt) = self.sessions.write().get_mut(session_id) {
            rt.paused = paused;
        }
    }

    fn is_paused(&self, session_id: &str) -> bool {
        self.sessions
            .read()
            .get(session_id)
            .map(|rt| rt.paused)
            .unwrap_or(false)
    }

    fn idle_seconds(&self, session_id: &str) -> Option<i64> {
        self.sessions
            .read()
            .get(session_id)
            .map(|rt| Utc::now().signed_duration_since(rt.last_inbound_at).num_seconds())
    }

    /// Called after a transition lands: resets the phase accumulator
    /// and recomputes `timer_active` against the new phase's position.
    fn on_transition(&self, session_id: &str, phase: &Phase) {
        if let Some(rt) = self.sessions.write().get_mut(session_id) {
            rt.current_phase_id = phase.id.clone();
            rt.phase_elapsed_seconds = 0;
            rt.timer_active = phase.position != 0;
        }
    }

    fn start_waiting(&self, session_id: &str, total_seconds: u32) {
        if let Some(rt) = self.sessions.write().get_mut(session_id) {
            rt.waiting = Some(WaitingState {
                total_seconds,
                remaining_seconds: total_seconds,
            });
        }
    }

    fn clear_waiting(&self, session_id: &str) {
        if let Some(rt) = self.sessions.write().get_mut(session_id) {
            rt.waiting = None;
        }
    }

    /// Report the countdown for the second just elapsed, then advance
    /// it. Returns the remaining count *before* decrementing, so a
    /// `total_seconds = 3` wait reports 3, 2, 1 (one event per second of
    /// the configured duration) before the next tick sees 0 and
    /// completes the wait.
    fn tick_waiting(&self, session_id: &str) -> Option<(u32, u32)> {
        let mut sessions = self.sessions.write();
        let rt = sessions.get_mut(session_id)?;
        let waiting = rt.waiting.as_mut()?;
        let remaining = waiting.remaining_seconds;
        waiting.remaining_seconds = waiting.remaining_seconds.saturating_sub(1);
        Some((remaining, waiting.total_seconds))
    }

    /// Advance the elapsed-time accumulators by one second if the
    /// timer is active and the session isn't paused.
    fn tick_elapsed(&self, session_id: &str) -> Option<(u64, u64, bool)> {
        let mut sessions = self.sessions.write();
        let rt = sessions.get_mut(session_id)?;
        if !rt.paused && rt.timer_active {
            rt.session_elapsed_seconds += 1;
            rt.phase_elapsed_seconds += 1;
        }
        Some((rt.session_elapsed_seconds, rt.phase_elapsed_seconds, rt.paused))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Inbound frames
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InboundFrame {
    Message { role: String, content: String },
    PauseSession,
    ResumeSession,
    StopSession,
    GetWorkflowStatus,
    TriggerCheckin,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Socket entry point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn handle_conductor_socket(socket: WebSocket, session_id: String, state: AppState) {
    let session = match state.store.get_session(&session_id).await {
        Ok(Some(s)) => s,
        Ok(None) => {
            tracing::warn!(session_id = %session_id, "conductor: unknown session, closing");
            return;
        }
        Err(e) => {
            tracing::warn!(session_id = %session_id, error = %e, "conductor: store error, closing");
            return;
        }
    };
    let Some(phase) = state.catalog.get_phase(&session.current_phase_id) else {
        tracing::warn!(session_id = %session_id, phase_id = %session.current_phase_id, "conductor: phase missing from catalog");
        return;
    };

    state.conductors.register(&session_id, &phase);
    let rx = state.broadcast.register(&session_id);

    let (mut sink, mut stream) = socket.split();
    let writer = tokio::spawn(async move { run_writer(&mut sink, rx).await });

    state.broadcast.publish(
        &session_id,
        OutboundEvent::new("connected").with_session_status(session_status_str(session.status)),
    );
    publish_initial_state(&state, &session_id).await;
    maybe_greet(&state, &session_id, &phase.id).await;

    let timer_state = state.clone();
    let timer_session = session_id.clone();
    let timer = tokio::spawn(async move { run_timer_loop(timer_state, timer_session).await });

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<InboundFrame>(&text) {
                Ok(frame) => handle_inbound_frame(&state, &session_id, frame).await,
                Err(e) => {
                    tracing::debug!(session_id = %session_id, error = %e, "conductor: ignoring unparseable frame");
                }
            },
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => state.broadcast.touch(&session_id),
            _ => {}
        }
    }

    timer.abort();
    writer.abort();
    state.broadcast.remove(&session_id);
    state.conductors.remove(&session_id);
    tracing::info!(session_id = %session_id, "conductor: disconnected");
}

async fn run_writer(
    sink: &mut (impl SinkExt<Message> + Unpin),
    mut rx: tokio::sync::mpsc::Receiver<OutboundEvent>,
) {
    while let Some(event) = rx.recv().await {
        let Ok(json) = serde_json::to_string(&event) else {
            continue;
        };
        if sink.send(Message::Text(json)).await.is_err() {
            break;
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Initial snapshot / greeting
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn publish_initial_state(state: &AppState, session_id: &str) {
    let Ok(Some(session)) = state.store.get_session(session_id).await else {
        return;
    };
    let Ok(values) = state.store.list_field_values(session_id).await else {
        return;
    };
    let recent = state
        .store
        .recent_messages(session_id, state.config.workflow.initial_snapshot_messages)
        .await
        .unwrap_or_default();

    let phases = state
        .catalog
        .all_phases()
        .into_iter()
        .map(|p| {
            let phase_data = state
                .catalog
                .get_fields(&p.id)
                .into_iter()
                .map(|f| PhaseFieldSummary {
                    name: f.name,
                    description: f.description,
                    required: f.required,
                    data_type: f
                        .schema
                        .get("type")
                        .and_then(Value::as_str)
                        .unwrap_or("string")
                        .to_owned(),
                })
                .collect();
            PhaseSummary {
                id: p.id,
                display_name: p.display_name,
                description: p.description,
                color: p.color,
                icon: p.icon,
                phase_data,
            }
        })
        .collect();

    let values_json = Value::Object(values.into_iter().map(|v| (v.field_name, v.value)).collect());
    let status = session_status_str(session.status);

    state.broadcast.publish(
        session_id,
        OutboundEvent::new("initial_state")
            .with_phase(session.current_phase_id)
            .with_session_status(status)
            .with_phase_data_values(values_json)
            .with_phases(phases)
            .with_recent_messages(recent),
    );
}

/// A freshly created session has no messages yet. Invoke the LLM with
/// an empty turn so it can generate the opening line, then persist and
/// broadcast it like any other assistant message (spec §4.E).
async fn maybe_greet(state: &AppState, session_id: &str, phase_id: &str) {
    let has_messages = state
        .store
        .list_messages(session_id)
        .await
        .map(|m| !m.is_empty())
        .unwrap_or(true);
    if has_messages {
        return;
    }
    invoke_llm_turn(state, session_id, phase_id).await;
}

/// `SessionStore` already retries a busy/locked connection with backoff;
/// seeing a [`pf_store::StoreError::WriteConflict`] here means that
/// budget was exhausted. Spec §7 asks for this case specifically (not
/// other store errors) to reach the client as a visible `error` event
/// rather than only a server-side log line.
fn report_store_error(state: &AppState, session_id: &str, context: &str, err: &pf_store::StoreError) {
    tracing::warn!(session_id = %session_id, error = %err, context, "conductor: store write failed");
    if matches!(err, pf_store::StoreError::WriteConflict(_)) {
        state.broadcast.publish(
            session_id,
            OutboundEvent::new("error").with_metadata(serde_json::json!({
                "context": context,
                "message": err.to_string(),
            })),
        );
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Inbound frame handling
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn handle_inbound_frame(state: &AppState, session_id: &str, frame: InboundFrame) {
    state.broadcast.touch(session_id);
    state.conductors.touch_inbound(session_id);

    match frame {
        InboundFrame::PauseSession => {
            state.conductors.set_paused(session_id, true);
            if let Err(e) = state.store.set_status(session_id, SessionStatus::Paused).await {
                report_store_error(state, session_id, "pause", &e);
            }
            state.broadcast.publish(
                session_id,
                OutboundEvent::new("session_paused").with_session_status("paused"),
            );
        }
        InboundFrame::ResumeSession => {
            state.conductors.set_paused(session_id, false);
            if let Err(e) = state.store.set_status(session_id, SessionStatus::Active).await {
                report_store_error(state, session_id, "resume", &e);
            }
            state.broadcast.publish(
                session_id,
                OutboundEvent::new("session_resumed").with_session_status("active"),
            );
        }
        InboundFrame::StopSession => {
            // No separate "stopped" status exists in the data model —
            // stopping halts the timer and further LLM turns the same
            // way an explicit pause does, without marking the session
            // complete (completion is reserved for the terminal phase).
            state.conductors.set_paused(session_id, true);
            if let Err(e) = state.store.set_status(session_id, SessionStatus::Paused).await {
                report_store_error(state, session_id, "stop", &e);
            }
            state.broadcast.publish(
                session_id,
                OutboundEvent::new("session_stopped").with_session_status("paused"),
            );
        }
        InboundFrame::GetWorkflowStatus => {
            publish_initial_state(state, session_id).await;
        }
        InboundFrame::TriggerCheckin => {
            if let Ok(Some(session)) = state.store.get_session(session_id).await {
                invoke_llm_turn(state, session_id, &session.current_phase_id).await;
            }
        }
        InboundFrame::Message { role, content } => {
            if role == "user" {
                process_user_message(state, session_id, content).await;
            }
        }
    }
}

async fn process_user_message(state: &AppState, session_id: &str, content: String) {
    if state.conductors.is_paused(session_id) {
        state.conductors.set_paused(session_id, false);
        if let Err(e) = state.store.set_status(session_id, SessionStatus::Active).await {
            report_store_error(state, session_id, "auto_resume", &e);
        }
        state.broadcast.publish(
            session_id,
            OutboundEvent::new("session_resumed").with_session_status("active"),
        );
    }

    let user_message = PfMessage::regular(session_id, MessageRole::User, content);
    if let Err(e) = state.store.append_message(&user_message).await {
        report_store_error(state, session_id, "user_message", &e);
        return;
    }
    state.broadcast.publish(
        session_id,
        OutboundEvent::new("message").with_message(user_message),
    );

    let Ok(Some(session)) = state.store.get_session(session_id).await else {
        return;
    };
    invoke_llm_turn(state, session_id, &session.current_phase_id).await;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM turn: prompt assembly, generation, message + tool-call handling
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn tool_definitions() -> Vec<ToolDefinition> {
    let def = collect_structured_data_def();
    vec![ToolDefinition {
        name: def.name,
        description: def.description,
        parameters: def.input_schema,
    }]
}

async fn invoke_llm_turn(state: &AppState, session_id: &str, phase_id: &str) {
    let prompt = match state.context.build_prompt(session_id, phase_id).await {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(session_id = %session_id, error = %e, "conductor: failed to build prompt");
            return;
        }
    };

    let request = GenerateRequest {
        prompt,
        tools: tool_definitions(),
        temperature: Some(state.config.llm.ai_temperature),
        max_tokens: Some(state.config.llm.ai_max_tokens),
    };

    let reply = match state.llm.generate(request).await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(session_id = %session_id, error = %e, "conductor: llm generation failed");
            return;
        }
    };

    if !reply.text.is_empty() {
        let assistant_message = PfMessage::regular(session_id, MessageRole::Assistant, reply.text);
        if let Err(e) = state.store.append_message(&assistant_message).await {
            report_store_error(state, session_id, "assistant_message", &e);
        } else {
            state.broadcast.publish(
                session_id,
                OutboundEvent::new("message").with_message(assistant_message),
            );
        }
    }

    if reply.tool_calls.is_empty() {
        return;
    }

    let handles: Vec<_> = reply
        .tool_calls
        .into_iter()
        .map(|call| {
            let state = state.clone();
            let session_id = session_id.to_owned();
            tokio::spawn(async move { run_tool_call(&state, &session_id, call).await })
        })
        .collect();
    futures_util::future::join_all(handles).await;
}

async fn run_tool_call(state: &AppState, session_id: &str, call: pf_domain::tool::ToolCall) {
    TraceEvent::ToolCallInvoked {
        session_id: session_id.to_owned(),
        tool_name: call.tool_name.clone(),
    }
    .emit();

    let mut message = PfMessage::tool_call(session_id, &call.tool_name, &call.arguments, ToolCallStatus::Executing);
    if let Err(e) = state.store.append_message(&message).await {
        report_store_error(state, session_id, "tool_call_row", &e);
        return;
    }
    state.broadcast.publish(
        session_id,
        OutboundEvent::new("message").with_message(message.clone()),
    );

    let request = JsonRpcRequest {
        jsonrpc: "2.0".into(),
        id: Value::String(call.call_id.clone()),
        method: "tools/call".into(),
        params: Some(serde_json::json!({
            "name": call.tool_name,
            "arguments": { "session_id": session_id, "data": call.arguments },
        })),
    };
    let response = state.tools.handle_request(request).await;

    let (status, result_value) = match extract_tool_result(&response) {
        Ok(value) => (ToolCallStatus::Completed, Some(value)),
        Err(reason) => {
            TraceEvent::ToolCallFailed {
                session_id: session_id.to_owned(),
                tool_name: call.tool_name.clone(),
                reason: reason.clone(),
            }
            .emit();
            (ToolCallStatus::Failed, Some(serde_json::json!({ "error": reason })))
        }
    };

    let metadata = serde_json::json!({
        "tool_name": call.tool_name,
        "arguments": call.arguments,
        "status": status,
        "result": result_value,
    });
    if let Err(e) = state.store.patch_message_metadata(&message.id, &metadata).await {
        report_store_error(state, session_id, "tool_call_metadata", &e);
    }
    message.metadata = Some(metadata);
    state.broadcast.publish(
        session_id,
        OutboundEvent::new("message").with_message(message),
    );

    if status == ToolCallStatus::Completed {
        react_to_transition(state, session_id, &response).await;
    }
}

fn extract_tool_result(response: &JsonRpcResponse) -> Result<Value, String> {
    if let Some(err) = &response.error {
        return Err(err.message.clone());
    }
    let result = response.result.clone().ok_or_else(|| "empty tool result".to_owned())?;
    let content = result
        .get("content")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .and_then(|c| c.get("text"))
        .and_then(Value::as_str)
        .ok_or_else(|| "malformed tool result".to_owned())?;
    serde_json::from_str(content).map_err(|e| e.to_string())
}

/// After `collect_structured_data` runs, react to whatever phase change
/// it produced: reset local timer bookkeeping and, if the new phase is
/// a timed-wait, kick off the countdown.
async fn react_to_transition(state: &AppState, session_id: &str, response: &JsonRpcResponse) {
    let Ok(result) = extract_tool_result(response) else {
        return;
    };
    let Some(new_phase_id) = result.get("new_phase").and_then(Value::as_str) else {
        return;
    };
    let Some(phase) = state.catalog.get_phase(new_phase_id) else {
        return;
    };
    state.conductors.on_transition(session_id, &phase);
    enter_phase(state, session_id, &phase).await;
}

/// Shared by the LLM-driven auto-transition path and the timed-wait
/// auto-advance path: if the phase just entered is itself a
/// timed-wait, announce and start its countdown.
async fn enter_phase(state: &AppState, session_id: &str, phase: &Phase) {
    if phase.phase_type != PhaseType::TimedWaiting {
        return;
    }
    let duration = phase.wait_duration_seconds.unwrap_or(0);
    state.conductors.start_waiting(session_id, duration);
    state.broadcast.publish(
        session_id,
        OutboundEvent::new("waiting_phase_started")
            .with_phase(phase.id.clone())
            .with_metadata(serde_json::json!({
                "total_seconds": duration,
                "pre_wait_message": phase.pre_wait_message,
            })),
    );
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Per-second timer loop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn run_timer_loop(state: AppState, session_id: String) {
    let interval = Duration::from_millis(state.config.timer.timer_tick_interval_ms.max(1));
    let inactivity_timeout = state.config.timer.inactivity_timeout_seconds as i64;

    loop {
        tokio::time::sleep(interval).await;

        let Ok(Some(session)) = state.store.get_session(&session_id).await else {
            break;
        };
        if session.status == SessionStatus::Completed {
            break;
        }

        if session.status == SessionStatus::Active {
            if let Some(idle) = state.conductors.idle_seconds(&session_id) {
                if idle >= inactivity_timeout {
                    state.conductors.set_paused(&session_id, true);
                    match state.store.set_status(&session_id, SessionStatus::Paused).await {
                        Ok(()) => {
                            state.broadcast.publish(
                                &session_id,
                                OutboundEvent::new("session_paused").with_session_status("paused"),
                            );
                        }
                        Err(e) => report_store_error(&state, &session_id, "inactivity_pause", &e),
                    }
                    continue;
                }
            }
        }

        if let Some((remaining, total)) = state.conductors.tick_waiting(&session_id) {
            if remaining == 0 {
                complete_waiting_phase(&state, &session_id, &session.current_phase_id).await;
            } else {
                state.broadcast.publish(
                    &session_id,
                    OutboundEvent::new("waiting_phase_countdown")
                        .with_phase(session.current_phase_id.clone())
                        .with_metadata(serde_json::json!({
                            "remaining_seconds": remaining,
                            "total_seconds": total,
                        })),
                );
            }
            continue;
        }

        if let Some((session_elapsed, phase_elapsed, paused)) = state.conductors.tick_elapsed(&session_id) {
            state.broadcast.publish(
                &session_id,
                OutboundEvent::new("timer_update")
                    .with_phase(session.current_phase_id)
                    .with_metadata(serde_json::json!({
                        "session_elapsed_seconds": session_elapsed,
                        "phase_elapsed_seconds": phase_elapsed,
                        "is_paused": paused,
                    })),
            );
        }
    }
}

/// The wait has elapsed: announce completion, clear local waiting
/// state, then auto-advance exactly as if `ready_to_transition` had
/// just become true (spec §4.E) — a timed-wait phase declares no
/// required fields, so an empty `collect_structured_data` call is
/// trivially ready once `minimum_turns` is satisfied.
async fn complete_waiting_phase(state: &AppState, session_id: &str, phase_id: &str) {
    state.conductors.clear_waiting(session_id);
    let post_wait_prompt = state.catalog.get_phase(phase_id).and_then(|p| p.post_wait_prompt);
    state.broadcast.publish(
        session_id,
        OutboundEvent::new("waiting_phase_completed")
            .with_phase(phase_id.to_owned())
            .with_metadata(serde_json::json!({ "post_wait_prompt": post_wait_prompt })),
    );

    match state.tools.collect_structured_data(session_id, &Map::new()).await {
        Ok(result) => {
            if let Some(new_phase_id) = result.new_phase {
                if let Some(phase) = state.catalog.get_phase(&new_phase_id) {
                    state.conductors.on_transition(session_id, &phase);
                    enter_phase(state, session_id, &phase).await;
                }
            }
        }
        Err(e) => {
            tracing::warn!(session_id = %session_id, error = %e, "conductor: failed to auto-advance timed-wait phase");
        }
    }
}

fn session_status_str(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Scheduled => "scheduled",
        SessionStatus::Active => "active",
        SessionStatus::Paused => "paused",
        SessionStatus::Completed => "completed",
    }
}
