//! The `collect_structured_data` tool (spec §4.D): the sole semantic
//! tool an LLM can call to record data and drive phase transitions.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex as SyncMutex;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex as AsyncMutex;

use pf_broadcast::Broadcaster;
use pf_catalog::Catalog;
use pf_domain::event::OutboundEvent;
use pf_domain::model::{detect_type_tag, FieldValue};
use pf_domain::trace::TraceEvent;
use pf_statemachine::StateMachine;
use pf_store::SessionStore;

use crate::error::{Result, ToolServerError};

#[derive(Debug, Clone, Serialize)]
pub struct CollectStructuredDataResult {
    pub success: bool,
    pub requirements_satisfied: Vec<String>,
    pub extra_data_stored: Vec<String>,
    pub missing_requirements: Vec<String>,
    pub ready_to_transition: bool,
    pub auto_transition_attempted: bool,
    pub auto_transition_success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuation: Option<String>,
}

/// Implements the tool, reachable both in-process and via the external
/// JSON-RPC endpoint — both entry points call this one implementation.
pub struct ToolServer {
    catalog: Arc<Catalog>,
    store: SessionStore,
    state_machine: StateMachine,
    broadcast: Arc<Broadcaster>,
    /// One lock per session so a phase transition and a concurrent
    /// `collect_structured_data` call on the same session never
    /// interleave (spec §5).
    session_locks: SyncMutex<std::collections::HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ToolServer {
    pub fn new(
        catalog: Arc<Catalog>,
        store: SessionStore,
        broadcast: Arc<Broadcaster>,
    ) -> Self {
        let state_machine = StateMachine::new(catalog.clone(), store.clone());
        Self {
            catalog,
            store,
            state_machine,
            broadcast,
            session_locks: SyncMutex::new(std::collections::HashMap::new()),
        }
    }

    fn session_lock(&self, session_id: &str) -> Arc<AsyncMutex<()>> {
        self.session_locks
            .lock()
            .entry(session_id.to_owned())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    pub async fn collect_structured_data(
        &self,
        session_id: &str,
        data: &Map<String, Value>,
    ) -> Result<CollectStructuredDataResult> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| ToolServerError::SessionNotFound(session_id.to_owned()))?;
        let phase = self
            .catalog
            .get_phase(&session.current_phase_id)
            .ok_or_else(|| ToolServerError::PhaseNotFound(session.current_phase_id.clone()))?;

        let fields = self.catalog.get_fields(&phase.id);
        let required_names: HashSet<&str> = fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();

        let mut requirements_satisfied = Vec::new();
        let mut extra_data_stored = Vec::new();
        let mut values = Vec::with_capacity(data.len());

        for (key, value) in data {
            if required_names.contains(key.as_str()) {
                requirements_satisfied.push(key.clone());
            } else {
                extra_data_stored.push(key.clone());
            }
            values.push(FieldValue {
                session_id: session_id.to_owned(),
                field_name: key.clone(),
                value: value.clone(),
                collected_in_phase: phase.id.clone(),
                type_tag: detect_type_tag(value).to_owned(),
                updated_at: Utc::now(),
            });
        }

        for field_name in &requirements_satisfied {
            TraceEvent::FieldCollected {
                session_id: session_id.to_owned(),
                field_name: field_name.clone(),
                phase_id: phase.id.clone(),
                is_requirement: true,
            }
            .emit();
        }

        // Completeness, the minimum-turns gate, and (for a branching
        // phase) the transition target all need to see this call's
        // values alongside whatever was already collected — without
        // writing them to the store first, so the only write this call
        // makes is the single atomic one below (invariant 4).
        let already_collected = self.store.list_field_values(session_id).await?;
        let mut merged: HashMap<&str, &Value> = already_collected
            .iter()
            .map(|v| (v.field_name.as_str(), &v.value))
            .collect();
        for v in &values {
            merged.insert(v.field_name.as_str(), &v.value);
        }
        let missing: Vec<String> = fields
            .iter()
            .filter(|f| f.required)
            .filter(|f| {
                !merged
                    .get(f.name.as_str())
                    .map(|v| pf_domain::model::is_collected(v))
                    .unwrap_or(false)
            })
            .map(|f| f.name.clone())
            .collect();
        let turns_met = self.state_machine.minimum_turns_met(session_id, &phase.id).await?;
        let ready = missing.is_empty() && turns_met;

        let branch_value = self
            .catalog
            .branching_field(&phase.id)
            .and_then(|field_name| merged.get(field_name.as_str()).and_then(|v| v.as_str()));
        let next_target = self.catalog.get_next(&phase.id, branch_value);

        let mut auto_transition_attempted = false;
        let mut auto_transition_success = false;
        let mut new_phase = None;
        let mut continuation = None;

        if ready {
            auto_transition_attempted = true;
            if self.state_machine.is_terminal_phase(&phase.id).await? {
                self.store.upsert_field_values(session_id, &values).await?;
                self.state_machine.complete_session(session_id).await?;
                auto_transition_success = true;
                self.broadcast.publish(
                    session_id,
                    OutboundEvent::new("session_completed")
                        .with_phase(phase.id.clone())
                        .with_session_status("completed"),
                );
            } else if let Some(target) = next_target {
                self.store
                    .apply_transition(session_id, &values, &target.id)
                    .await?;
                auto_transition_success = true;
                new_phase = Some(target.id.clone());
                continuation = self
                    .catalog
                    .get_active_prompt("continuation", Some(&target.id))
                    .map(|p| p.text);
                TraceEvent::PhaseTransition {
                    session_id: session_id.to_owned(),
                    from_phase: phase.id.clone(),
                    to_phase: target.id.clone(),
                    reason: "collect_structured_data".into(),
                }
                .emit();
                self.broadcast.publish(
                    session_id,
                    OutboundEvent::new("phase_transition")
                        .with_phase(target.id.clone())
                        .with_session_status("active"),
                );

                // Follow-up event carrying the post-transition field
                // view, so a client that only observes one event type
                // still converges on the same phase_data.
                let values = self.store.list_field_values(session_id).await?;
                let values_json = Value::Object(
                    values
                        .into_iter()
                        .map(|v| (v.field_name, v.value))
                        .collect(),
                );
                self.broadcast.publish(
                    session_id,
                    OutboundEvent::new("session_updated")
                        .with_phase(target.id.clone())
                        .with_session_status("active")
                        .with_phase_data_values(values_json),
                );
            } else {
                // Ready but no resolvable next phase — a misconfigured
                // workflow. Still persist what was collected.
                self.store.upsert_field_values(session_id, &values).await?;
            }
        } else {
            self.store.upsert_field_values(session_id, &values).await?;
        }

        Ok(CollectStructuredDataResult {
            success: true,
            requirements_satisfied,
            extra_data_stored,
            missing_requirements: missing,
            ready_to_transition: ready,
            auto_transition_attempted,
            auto_transition_success,
            new_phase,
            continuation,
        })
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

    async fn setup() -> (ToolServer, SessionStore, String) {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(WORKFLOW.as_bytes()).unwrap();
        let catalog = Arc::new(Catalog::load(f.path()).unwrap());
        let store = SessionStore::open_in_memory().await.unwrap();
        let session = store.create_session("u1", "op1", "A").await.unwrap();
        let broadcast = Arc::new(Broadcaster::new());
        let server = ToolServer::new(catalog, store.clone(), broadcast);
        (server, store, session.id)
    }

    #[tokio::test]
    async fn required_field_satisfies_and_transitions() {
        let (server, store, session_id) = setup().await;
        let mut data = Map::new();
        data.insert("name".into(), serde_json::json!("Alex"));

        let result = server
            .collect_structured_data(&session_id, &data)
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.requirements_satisfied, vec!["name".to_string()]);
        assert!(result.missing_requirements.is_empty());
        assert!(result.ready_to_transition);
        assert!(result.auto_transition_attempted);
        assert!(result.auto_transition_success);
        assert_eq!(result.new_phase.as_deref(), Some("B"));

        let session = store.get_session(&session_id).await.unwrap().unwrap();
        assert_eq!(session.current_phase_id, "B");
    }

    #[tokio::test]
    async fn extra_data_is_classified_separately() {
        let (server, _store, session_id) = setup().await;
        let mut data = Map::new();
        data.insert("mood".into(), serde_json::json!("anxious"));

        let result = server
            .collect_structured_data(&session_id, &data)
            .await
            .unwrap();

        assert!(result.requirements_satisfied.is_empty());
        assert_eq!(result.extra_data_stored, vec!["mood".to_string()]);
        assert_eq!(result.missing_requirements, vec!["name".to_string()]);
        assert!(!result.ready_to_transition);
        assert!(!result.auto_transition_attempted);
    }

    #[tokio::test]
    async fn terminal_phase_completes_session() {
        let (server, store, session_id) = setup().await;
        let mut data = Map::new();
        data.insert("name".into(), serde_json::json!("Alex"));
        server
            .collect_structured_data(&session_id, &data)
            .await
            .unwrap();

        // Phase B has no required fields, so collecting nothing on it
        // should already be ready — and terminal, since it has no next.
        let result = server
            .collect_structured_data(&session_id, &Map::new())
            .await
            .unwrap();
        assert!(result.auto_transition_success);
        assert!(result.new_phase.is_none());

        let session = store.get_session(&session_id).await.unwrap().unwrap();
        assert!(session.is_terminal());
    }
}
