//! Structured trace events emitted across all PhaseForge crates.
//!
//! Each event is logged as a single JSON-encoded `tracing::info!` record
//! under the `pf_event` field, so a log pipeline can index on `event`
//! without parsing free-text messages.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionCreated {
        session_id: String,
        workflow_phase: String,
    },
    PhaseTransition {
        session_id: String,
        from_phase: String,
        to_phase: String,
        reason: String,
    },
    SessionCompleted {
        session_id: String,
        final_phase: String,
    },
    FieldCollected {
        session_id: String,
        field_name: String,
        phase_id: String,
        is_requirement: bool,
    },
    ToolCallInvoked {
        session_id: String,
        tool_name: String,
    },
    ToolCallFailed {
        session_id: String,
        tool_name: String,
        reason: String,
    },
    BackupSnapshot {
        bytes: u64,
        duration_ms: u64,
    },
    BackupFailure {
        reason: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(pf_event = %json, "pf_event");
    }
}
