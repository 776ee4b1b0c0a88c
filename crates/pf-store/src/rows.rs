use chrono::{DateTime, Utc};
use rusqlite::Row;

use pf_domain::model::{
    FieldValue, Message, MessageRole, MessageType, Session, SessionStatus,
};

pub fn parse_dt(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

pub fn session_status_str(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Scheduled => "scheduled",
        SessionStatus::Active => "active",
        SessionStatus::Paused => "paused",
        SessionStatus::Completed => "completed",
    }
}

fn parse_session_status(raw: &str) -> SessionStatus {
    match raw {
        "scheduled" => SessionStatus::Scheduled,
        "active" => SessionStatus::Active,
        "paused" => SessionStatus::Paused,
        _ => SessionStatus::Completed,
    }
}

pub fn session_from_row(row: &Row) -> rusqlite::Result<Session> {
    let status_raw: String = row.get("status")?;
    let current_phase_entered_at: String = row.get("current_phase_entered_at")?;
    let start_time: String = row.get("start_time")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    Ok(Session {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        operator_id: row.get("operator_id")?,
        status: parse_session_status(&status_raw),
        current_phase_id: row.get("current_phase_id")?,
        current_phase_entered_at: parse_dt(&current_phase_entered_at),
        start_time: parse_dt(&start_time),
        created_at: parse_dt(&created_at),
        updated_at: parse_dt(&updated_at),
    })
}

pub fn message_role_str(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::System => "system",
        MessageRole::ToolCall => "toolcall",
    }
}

fn parse_message_role(raw: &str) -> MessageRole {
    match raw {
        "user" => MessageRole::User,
        "assistant" => MessageRole::Assistant,
        "system" => MessageRole::System,
        _ => MessageRole::ToolCall,
    }
}

pub fn message_type_str(t: MessageType) -> &'static str {
    match t {
        MessageType::Regular => "regular",
        MessageType::ToolCall => "tool_call",
    }
}

fn parse_message_type(raw: &str) -> MessageType {
    match raw {
        "tool_call" => MessageType::ToolCall,
        _ => MessageType::Regular,
    }
}

pub fn message_from_row(row: &Row) -> rusqlite::Result<Message> {
    let role_raw: String = row.get("role")?;
    let type_raw: String = row.get("message_type")?;
    let metadata_raw: Option<String> = row.get("metadata")?;
    let created_at: String = row.get("created_at")?;
    let metadata = metadata_raw
        .as_deref()
        .and_then(|s| serde_json::from_str(s).ok());
    Ok(Message {
        id: row.get("id")?,
        session_id: row.get("session_id")?,
        role: parse_message_role(&role_raw),
        content: row.get("content")?,
        message_type: parse_message_type(&type_raw),
        metadata,
        created_at: parse_dt(&created_at),
    })
}

pub fn field_value_from_row(row: &Row) -> rusqlite::Result<FieldValue> {
    let value_raw: String = row.get("value")?;
    let updated_at: String = row.get("updated_at")?;
    let value = serde_json::from_str(&value_raw).unwrap_or(serde_json::Value::Null);
    Ok(FieldValue {
        session_id: row.get("session_id")?,
        field_name: row.get("field_name")?,
        value,
        collected_in_phase: row.get("collected_in_phase")?,
        type_tag: row.get("type_tag")?,
        updated_at: parse_dt(&updated_at),
    })
}
