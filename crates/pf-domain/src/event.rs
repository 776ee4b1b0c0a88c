//! The outbound frame pushed to a connected client (spec §6).
//!
//! One envelope shape for every event type; fields not relevant to a
//! given `type` are left `None` and skipped on serialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Message;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseFieldSummary {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub data_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseSummary {
    pub id: String,
    pub display_name: String,
    pub description: String,
    pub color: String,
    pub icon: String,
    pub phase_data: Vec<PhaseFieldSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_data_values: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phases: Option<Vec<PhaseSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_messages: Option<Vec<Message>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl OutboundEvent {
    /// A bare event with only a type and a timestamp; callers fill in
    /// whichever optional fields their event carries.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            phase: None,
            session_status: None,
            phase_data_values: None,
            phases: None,
            recent_messages: None,
            message: None,
            metadata: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = Some(phase.into());
        self
    }

    pub fn with_session_status(mut self, status: impl Into<String>) -> Self {
        self.session_status = Some(status.into());
        self
    }

    pub fn with_phase_data_values(mut self, values: serde_json::Value) -> Self {
        self.phase_data_values = Some(values);
        self
    }

    pub fn with_phases(mut self, phases: Vec<PhaseSummary>) -> Self {
        self.phases = Some(phases);
        self
    }

    pub fn with_recent_messages(mut self, messages: Vec<Message>) -> Self {
        self.recent_messages = Some(messages);
        self
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.message = Some(message);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omits_absent_optional_fields() {
        let event = OutboundEvent::new("session_paused");
        let json = serde_json::to_value(&event).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("phase"));
        assert!(!obj.contains_key("message"));
        assert_eq!(obj["type"], "session_paused");
    }

    #[test]
    fn builder_sets_requested_fields() {
        let event = OutboundEvent::new("phase_transition")
            .with_phase("B")
            .with_session_status("active");
        assert_eq!(event.phase.as_deref(), Some("B"));
        assert_eq!(event.session_status.as_deref(), Some("active"));
    }
}
