//! State Machine (spec §4.C): pure decision logic over the Catalog and
//! Store. No direct I/O to the client or the LLM.

use std::sync::Arc;

use pf_catalog::Catalog;
use pf_domain::model::Phase;
use pf_store::SessionStore;

#[derive(Debug, thiserror::Error)]
pub enum StateMachineError {
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("requirements not met, missing: {missing:?}")]
    RequirementsNotMet { missing: Vec<String> },

    #[error("phase not found: {0}")]
    PhaseNotFound(String),

    #[error("store: {0}")]
    Store(#[from] pf_store::StoreError),
}

pub type Result<T> = std::result::Result<T, StateMachineError>;

/// Result of checking whether a phase's required fields are all present.
#[derive(Debug, Clone)]
pub struct PhaseCompleteness {
    pub complete: bool,
    pub missing: Vec<String>,
}

pub struct StateMachine {
    catalog: Arc<Catalog>,
    store: SessionStore,
}

impl StateMachine {
    pub fn new(catalog: Arc<Catalog>, store: SessionStore) -> Self {
        Self { catalog, store }
    }

    /// True iff a Transition row from→to exists, or `to` resolves via
    /// `"next"`/a numeric position string/a phase id (spec §4.C).
    pub fn validate_transition(&self, from_phase_id: &str, to: &str) -> Result<bool> {
        if self.catalog.get_phase(from_phase_id).is_none() {
            return Err(StateMachineError::PhaseNotFound(from_phase_id.to_owned()));
        }
        Ok(self.catalog.resolve_target(from_phase_id, to).is_some())
    }

    /// True iff every required PhaseField for `phase_id` has a
    /// corresponding non-empty FieldValue for `session_id`, counting all
    /// accumulated values, not only those written in the current call
    /// (invariant 3).
    pub async fn phase_complete(&self, session_id: &str, phase_id: &str) -> Result<PhaseCompleteness> {
        let fields = self.catalog.get_fields(phase_id);
        let collected = self.store.list_field_values(session_id).await?;

        let mut missing = Vec::new();
        for field in fields.iter().filter(|f| f.required) {
            let has_value = collected
                .iter()
                .find(|v| v.field_name == field.name)
                .map(|v| pf_domain::model::is_collected(&v.value))
                .unwrap_or(false);
            if !has_value {
                missing.push(field.name.clone());
            }
        }

        Ok(PhaseCompleteness {
            complete: missing.is_empty(),
            missing,
        })
    }

    /// Count of user Messages since the session's most recent entry into
    /// its current phase, compared against `phase.minimum_turns` (spec
    /// §9 Open Question — "since most recent entry" semantics; see
    /// DESIGN.md).
    pub async fn minimum_turns_met(&self, session_id: &str, phase_id: &str) -> Result<bool> {
        let phase = self
            .catalog
            .get_phase(phase_id)
            .ok_or_else(|| StateMachineError::PhaseNotFound(phase_id.to_owned()))?;
        if phase.minimum_turns == 0 {
            return Ok(true);
        }
        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| StateMachineError::PhaseNotFound(session_id.to_owned()))?;
        let count = self
            .store
            .count_user_messages_since(session_id, session.current_phase_entered_at)
            .await?;
        Ok(count >= phase.minimum_turns)
    }

    pub async fn ready_to_transition(&self, session_id: &str) -> Result<bool> {
        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| StateMachineError::PhaseNotFound(session_id.to_owned()))?;
        let completeness = self
            .phase_complete(session_id, &session.current_phase_id)
            .await?;
        let turns_met = self
            .minimum_turns_met(session_id, &session.current_phase_id)
            .await?;
        Ok(completeness.complete && turns_met)
    }

    /// Resolve the next phase: a branching field's collected value if the
    /// current phase declares one and it names a reachable phase,
    /// otherwise position-based advance (spec §4.C `next_phase`).
    pub async fn next_phase(&self, session_id: &str) -> Result<Option<Phase>> {
        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| StateMachineError::PhaseNotFound(session_id.to_owned()))?;
        let phase_id = &session.current_phase_id;

        let branch_value = if let Some(field_name) = self.catalog.branching_field(phase_id) {
            let values = self.store.list_field_values(session_id).await?;
            values
                .into_iter()
                .find(|v| v.field_name == field_name)
                .and_then(|v| v.value.as_str().map(str::to_owned))
        } else {
            None
        };

        Ok(self.catalog.get_next(phase_id, branch_value.as_deref()))
    }

    /// True iff `phase_id` has no reachable next phase — the terminal
    /// phase of the workflow.
    pub async fn is_terminal_phase(&self, phase_id: &str) -> Result<bool> {
        Ok(self.catalog.get_next(phase_id, None).is_none()
            && self.catalog.branching_field(phase_id).is_none())
    }

    /// Only permitted when the current phase is terminal; sets
    /// `status = completed`.
    pub async fn complete_session(&self, session_id: &str) -> Result<()> {
        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| StateMachineError::PhaseNotFound(session_id.to_owned()))?;
        if !self.is_terminal_phase(&session.current_phase_id).await? {
            return Err(StateMachineError::InvalidTransition {
                from: session.current_phase_id,
                to: "completed".into(),
            });
        }
        self.store.complete_session(session_id).await?;
        pf_domain::trace::TraceEvent::SessionCompleted {
            session_id: session_id.to_owned(),
            final_phase: session.current_phase_id,
        }
        .emit();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const WORKFLOW: &str = r#"
updated_at = "2026-01-01T00:00:00Z"

[[phase]]
id = "A"
position = 0
display_name = "Intro"
type = "conversational"
minimum_turns = 1

[[phase]]
id = "B"
position = 1
display_name = "Finish"
type = "conversational"

[[field]]
phase_id = "A"
name = "name"
required = true

[[transition]]
from_phase_id = "A"
to_phase_id = "B"
guard = "all_required_present"
"#;

    async fn setup() -> (StateMachine, pf_store::SessionStore, String) {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(WORKFLOW.as_bytes()).unwrap();
        let catalog = Arc::new(Catalog::load(f.path()).unwrap());
        let store = SessionStore::open_in_memory().await.unwrap();
        let session = store.create_session("u1", "op1", "A").await.unwrap();
        let sm = StateMachine::new(catalog, store.clone());
        (sm, store, session.id)
    }

    #[tokio::test]
    async fn phase_not_complete_without_required_fields() {
        let (sm, _store, session_id) = setup().await;
        let completeness = sm.phase_complete(&session_id, "A").await.unwrap();
        assert!(!completeness.complete);
        assert_eq!(completeness.missing, vec!["name".to_string()]);
    }

    #[tokio::test]
    async fn ready_to_transition_requires_both_conditions() {
        let (sm, store, session_id) = setup().await;
        store
            .upsert_field_values(
                &session_id,
                &[pf_domain::model::FieldValue {
                    session_id: session_id.clone(),
                    field_name: "name".into(),
                    value: serde_json::json!("Alex"),
                    collected_in_phase: "A".into(),
                    type_tag: "string".into(),
                    updated_at: chrono::Utc::now(),
                }],
            )
            .await
            .unwrap();

        // minimum_turns = 1 but no user message has been sent yet.
        assert!(!sm.ready_to_transition(&session_id).await.unwrap());
    }

    #[tokio::test]
    async fn next_phase_falls_back_to_position() {
        let (sm, _store, session_id) = setup().await;
        let next = sm.next_phase(&session_id).await.unwrap().unwrap();
        assert_eq!(next.id, "B");
    }
}
