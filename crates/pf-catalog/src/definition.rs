//! On-disk TOML shape of a workflow definition.
//!
//! A definition is a flat set of phases, fields, transitions, and prompts
//! plus an `updated_at` watermark. Bumping the watermark is how a writer
//! signals the catalog to invalidate its snapshot (spec §4.A).

use chrono::{DateTime, Utc};
use serde::Deserialize;

use pf_domain::model::{Phase, PhaseField, Prompt, Transition, TransitionGuard};

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowDefinition {
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "phase", default)]
    pub phases: Vec<RawPhase>,
    #[serde(rename = "field", default)]
    pub fields: Vec<RawField>,
    #[serde(rename = "transition", default)]
    pub transitions: Vec<RawTransition>,
    #[serde(rename = "prompt", default)]
    pub prompts: Vec<RawPrompt>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPhase {
    pub id: String,
    pub position: i64,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub icon: String,
    #[serde(rename = "type")]
    pub phase_type: String,
    #[serde(default)]
    pub minimum_turns: u32,
    #[serde(default)]
    pub wait_duration_seconds: Option<u32>,
    #[serde(default)]
    pub pre_wait_message: Option<String>,
    #[serde(default)]
    pub post_wait_prompt: Option<String>,
    #[serde(default)]
    pub visualization_type: Option<String>,
}

impl RawPhase {
    pub fn into_phase(self) -> Result<Phase, String> {
        let phase_type = match self.phase_type.as_str() {
            "conversational" => pf_domain::model::PhaseType::Conversational,
            "timed_waiting" => pf_domain::model::PhaseType::TimedWaiting,
            other => return Err(format!("phase {}: unknown type {other}", self.id)),
        };
        Ok(Phase {
            id: self.id,
            position: self.position,
            display_name: self.display_name,
            description: self.description,
            color: self.color,
            icon: self.icon,
            phase_type,
            minimum_turns: self.minimum_turns,
            wait_duration_seconds: self.wait_duration_seconds,
            pre_wait_message: self.pre_wait_message,
            post_wait_prompt: self.post_wait_prompt,
            visualization_type: self.visualization_type,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawField {
    pub phase_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default = "default_schema")]
    pub schema: serde_json::Value,
}

fn default_schema() -> serde_json::Value {
    serde_json::json!({ "type": "string" })
}

impl From<RawField> for PhaseField {
    fn from(r: RawField) -> Self {
        PhaseField {
            phase_id: r.phase_id,
            name: r.name,
            description: r.description,
            required: r.required,
            schema: r.schema,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTransition {
    pub from_phase_id: String,
    pub to_phase_id: String,
    /// `"all_required_present"` or `"branching:<field_name>"`.
    #[serde(default = "default_guard")]
    pub guard: String,
    #[serde(default)]
    pub priority: i64,
}

fn default_guard() -> String {
    "all_required_present".into()
}

impl RawTransition {
    pub fn into_transition(self) -> Result<Transition, String> {
        let guard = if self.guard == "all_required_present" {
            TransitionGuard::AllRequiredPresent
        } else if let Some(field_name) = self.guard.strip_prefix("branching:") {
            TransitionGuard::Branching {
                field_name: field_name.to_owned(),
            }
        } else {
            return Err(format!(
                "transition {}->{}: unknown guard '{}'",
                self.from_phase_id, self.to_phase_id, self.guard
            ));
        };
        Ok(Transition {
            from_phase_id: self.from_phase_id,
            to_phase_id: self.to_phase_id,
            guard,
            priority: self.priority,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPrompt {
    #[serde(default = "uuid_v4")]
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub phase_id: Option<String>,
    #[serde(default = "default_version")]
    pub version: i64,
    pub text: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn uuid_v4() -> String {
    uuid::Uuid::new_v4().to_string()
}
fn default_version() -> i64 {
    1
}
fn default_active() -> bool {
    true
}

impl From<RawPrompt> for Prompt {
    fn from(r: RawPrompt) -> Self {
        Prompt {
            id: r.id,
            name: r.name,
            category: r.category,
            phase_id: r.phase_id,
            version: r.version,
            text: r.text,
            is_active: r.is_active,
            created_at: Utc::now(),
        }
    }
}
