//! Core entities of the workflow data model (spec §3).
//!
//! These types are store-agnostic: they describe the shape of the data,
//! not how it is persisted. `pf-store` owns the sqlite mapping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Phase
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseType {
    Conversational,
    TimedWaiting,
}

/// One node in the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub id: String,
    pub position: i64,
    pub display_name: String,
    pub description: String,
    pub color: String,
    pub icon: String,
    #[serde(rename = "type")]
    pub phase_type: PhaseType,
    pub minimum_turns: u32,
    /// `Some` iff `phase_type == TimedWaiting`.
    pub wait_duration_seconds: Option<u32>,
    pub pre_wait_message: Option<String>,
    pub post_wait_prompt: Option<String>,
    pub visualization_type: Option<String>,
}

/// A typed datum a phase must collect to advance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseField {
    pub phase_id: String,
    pub name: String,
    pub description: String,
    pub required: bool,
    /// JSON schema fragment: `type`, optional `enum`, numeric bounds, etc.
    pub schema: serde_json::Value,
}

/// An edge in the workflow graph, optionally guarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub from_phase_id: String,
    pub to_phase_id: String,
    pub guard: TransitionGuard,
    pub priority: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransitionGuard {
    /// Fires once every required field of the `from` phase is collected.
    AllRequiredPresent,
    /// Fires based on the collected value of a designated branching field
    /// (conventionally named `next_action`), whose schema enumerates the
    /// legal target phase ids.
    Branching { field_name: String },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Scheduled,
    Active,
    Paused,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub operator_id: String,
    pub status: SessionStatus,
    pub current_phase_id: String,
    /// When the session entered `current_phase_id`. Used to scope
    /// `minimum_turns` counting to the current phase visit (spec §9).
    pub current_phase_entered_at: DateTime<Utc>,
    pub start_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn is_terminal(&self) -> bool {
        self.status == SessionStatus::Completed
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    ToolCall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Regular,
    ToolCall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Executing,
    Completed,
    Failed,
}

/// An append-only conversation row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    pub message_type: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn regular(session_id: &str, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_owned(),
            role,
            content: content.into(),
            message_type: MessageType::Regular,
            metadata: None,
            created_at: Utc::now(),
        }
    }

    pub fn tool_call(
        session_id: &str,
        tool_name: &str,
        arguments: &serde_json::Value,
        status: ToolCallStatus,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_owned(),
            role: MessageRole::ToolCall,
            content: String::new(),
            message_type: MessageType::ToolCall,
            metadata: Some(serde_json::json!({
                "tool_name": tool_name,
                "arguments": arguments,
                "status": status,
            })),
            created_at: Utc::now(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// FieldValue
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A stored (session, field_name) → JSON value pair. Upsert semantics:
/// the most recent write wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldValue {
    pub session_id: String,
    pub field_name: String,
    pub value: serde_json::Value,
    /// The phase during which this value was collected.
    pub collected_in_phase: String,
    pub type_tag: String,
    pub updated_at: DateTime<Utc>,
}

/// Classify a JSON value into a coarse type tag, mirroring what a
/// dynamically-typed `collect_structured_data` payload would carry.
pub fn detect_type_tag(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// A non-empty FieldValue counts as "collected" per spec §4.C.
pub fn is_collected(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(a) => !a.is_empty(),
        serde_json::Value::Object(o) => !o.is_empty(),
        _ => true,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Prompt
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A named, versioned prompt text. "Updating" inserts a new active
/// version and deactivates the prior one — versions are append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    pub id: String,
    pub name: String,
    pub category: String,
    pub phase_id: Option<String>,
    pub version: i64,
    pub text: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_collected_rejects_empty() {
        assert!(!is_collected(&serde_json::Value::Null));
        assert!(!is_collected(&serde_json::json!("")));
        assert!(!is_collected(&serde_json::json!([])));
        assert!(!is_collected(&serde_json::json!({})));
    }

    #[test]
    fn is_collected_accepts_non_empty() {
        assert!(is_collected(&serde_json::json!("Alex")));
        assert!(is_collected(&serde_json::json!(0)));
        assert!(is_collected(&serde_json::json!(false)));
        assert!(is_collected(&serde_json::json!(["a"])));
    }

    #[test]
    fn detect_type_tag_matches_variant() {
        assert_eq!(detect_type_tag(&serde_json::json!("x")), "string");
        assert_eq!(detect_type_tag(&serde_json::json!(1)), "number");
        assert_eq!(detect_type_tag(&serde_json::json!(true)), "boolean");
        assert_eq!(detect_type_tag(&serde_json::json!({"a":1})), "object");
    }
}
