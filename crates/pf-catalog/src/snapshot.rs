use std::collections::HashMap;

use pf_domain::model::{Phase, PhaseField, Prompt, Transition, TransitionGuard};

use crate::definition::WorkflowDefinition;

/// An immutable, indexed view of one workflow definition. Rebuilt wholesale
/// on reload; never mutated in place (spec §4.A — "in-memory snapshot").
pub struct Snapshot {
    phases_by_id: HashMap<String, Phase>,
    phases_by_position: Vec<Phase>,
    fields_by_phase: HashMap<String, Vec<PhaseField>>,
    transitions_by_from: HashMap<String, Vec<Transition>>,
    prompts: Vec<Prompt>,
}

impl Snapshot {
    pub fn build(def: WorkflowDefinition) -> Result<Self, String> {
        let mut phases_by_id = HashMap::new();
        let mut phases_by_position = Vec::new();
        for raw in def.phases {
            let phase = raw.into_phase()?;
            phases_by_position.push(phase.clone());
            phases_by_id.insert(phase.id.clone(), phase);
        }
        phases_by_position.sort_by_key(|p| p.position);

        let mut fields_by_phase: HashMap<String, Vec<PhaseField>> = HashMap::new();
        for raw in def.fields {
            let field: PhaseField = raw.into();
            fields_by_phase
                .entry(field.phase_id.clone())
                .or_default()
                .push(field);
        }

        let mut transitions_by_from: HashMap<String, Vec<Transition>> = HashMap::new();
        for raw in def.transitions {
            let t = raw.into_transition()?;
            transitions_by_from
                .entry(t.from_phase_id.clone())
                .or_default()
                .push(t);
        }
        for list in transitions_by_from.values_mut() {
            list.sort_by_key(|t| -t.priority);
        }

        let prompts = def.prompts.into_iter().map(Prompt::from).collect();

        Ok(Self {
            phases_by_id,
            phases_by_position,
            fields_by_phase,
            transitions_by_from,
            prompts,
        })
    }

    pub fn get_phase(&self, id: &str) -> Option<&Phase> {
        self.phases_by_id.get(id)
    }

    pub fn all_phases(&self) -> &[Phase] {
        &self.phases_by_position
    }

    pub fn get_fields(&self, phase_id: &str) -> &[PhaseField] {
        self.fields_by_phase
            .get(phase_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn transitions_from(&self, phase_id: &str) -> &[Transition] {
        self.transitions_by_from
            .get(phase_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The phase immediately after `phase_id` by position, if any.
    pub fn next_by_position(&self, phase_id: &str) -> Option<&Phase> {
        let current = self.phases_by_id.get(phase_id)?;
        self.phases_by_position
            .iter()
            .find(|p| p.position == current.position + 1)
    }

    /// Resolve a raw transition target string: a phase id, the literal
    /// `"next"`, or a numeric position string (spec §4.C
    /// `validate_transition`).
    pub fn resolve_target(&self, from_phase_id: &str, raw: &str) -> Option<&Phase> {
        if raw == "next" {
            return self.next_by_position(from_phase_id);
        }
        if let Ok(position) = raw.parse::<i64>() {
            return self.phases_by_position.iter().find(|p| p.position == position);
        }
        self.phases_by_id.get(raw)
    }

    /// The branching field name declared on an outgoing transition from
    /// `phase_id`, if one of its transitions uses a `Branching` guard.
    pub fn branching_field(&self, phase_id: &str) -> Option<&str> {
        self.transitions_from(phase_id).iter().find_map(|t| match &t.guard {
            TransitionGuard::Branching { field_name } => Some(field_name.as_str()),
            TransitionGuard::AllRequiredPresent => None,
        })
    }

    pub fn get_active_prompt(&self, category: &str, phase_id: Option<&str>) -> Option<&Prompt> {
        self.prompts
            .iter()
            .filter(|p| p.is_active && p.category == category)
            .filter(|p| phase_id.is_none() || p.phase_id.as_deref() == phase_id)
            .max_by_key(|p| p.version)
    }
}
