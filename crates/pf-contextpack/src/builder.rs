//! Deterministic context pack builder.
//!
//! Pure function: accepts already-fetched phase/field/message data and
//! caps, returns an assembled prompt string plus a machine-readable
//! report. All store/catalog I/O happens in [`crate::ContextPackProvider`];
//! this module only formats.

use pf_domain::model::{FieldValue, Message, MessageRole, Phase};

use crate::report::{ContextReport, SectionReport};
use crate::truncation::{self, Section};

pub struct ContextPackBuilder {
    pub max_per_section: usize,
    pub total_max: usize,
}

impl ContextPackBuilder {
    pub fn new(max_per_section: usize, total_max: usize) -> Self {
        Self {
            max_per_section,
            total_max,
        }
    }

    /// Assemble a prompt from a phase, its collected field values, the
    /// active prompt text for the phase (if any), and recent messages.
    pub fn build(
        &self,
        phase: &Phase,
        values: &[FieldValue],
        active_prompt: Option<&str>,
        recent_messages: &[Message],
    ) -> (String, ContextReport) {
        let mut raw_sections = Vec::new();

        let mut workflow_section = format!("Phase: {}\n", phase.display_name);
        if !phase.description.is_empty() {
            workflow_section.push_str(&format!("{}\n", phase.description));
        }
        if let Some(text) = active_prompt {
            workflow_section.push_str(&format!("\n{text}\n"));
        }
        raw_sections.push(("instructions".to_string(), workflow_section));

        if !values.is_empty() {
            let mut collected = String::from("Collected so far:\n");
            for value in values {
                collected.push_str(&format!("- {}: {}\n", value.field_name, value.value));
            }
            raw_sections.push(("collected_fields".to_string(), collected));
        }

        if !recent_messages.is_empty() {
            let mut transcript = String::from("Recent conversation:\n");
            for message in recent_messages {
                let speaker = match message.role {
                    MessageRole::User => "User",
                    MessageRole::Assistant => "Assistant",
                    MessageRole::System => "System",
                    MessageRole::ToolCall => continue,
                };
                transcript.push_str(&format!("{speaker}: {}\n", message.content));
            }
            raw_sections.push(("recent_messages".to_string(), transcript));
        }

        let mut sections: Vec<Section> = raw_sections
            .into_iter()
            .map(|(name, content)| {
                let raw_chars = content.len();
                let (truncated, was_truncated) =
                    truncation::truncate_per_section(&content, self.max_per_section);
                Section {
                    name,
                    content: truncated,
                    raw_chars,
                    truncated_per_section: was_truncated,
                    truncated_total_cap: false,
                    included: true,
                }
            })
            .collect();

        truncation::apply_total_cap(&mut sections, self.total_max);

        let mut assembled = String::new();
        let mut section_reports = Vec::new();
        for section in &sections {
            section_reports.push(SectionReport {
                name: section.name.clone(),
                raw_chars: section.raw_chars,
                injected_chars: if section.included { section.content.len() } else { 0 },
                truncated_per_section: section.truncated_per_section,
                truncated_total_cap: section.truncated_total_cap,
                included: section.included,
            });
            if section.included && !section.content.is_empty() {
                assembled.push_str(&section.content);
                assembled.push('\n');
            }
        }

        let total_injected_chars = assembled.len();
        let report = ContextReport {
            sections: section_reports,
            total_injected_chars,
        };

        (assembled, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pf_domain::model::{MessageType, PhaseType};

    fn phase() -> Phase {
        Phase {
            id: "A".into(),
            position: 0,
            display_name: "Intro".into(),
            description: "Greet the user".into(),
            color: String::new(),
            icon: String::new(),
            phase_type: PhaseType::Conversational,
            minimum_turns: 0,
            wait_duration_seconds: None,
            pre_wait_message: None,
            post_wait_prompt: None,
            visualization_type: None,
        }
    }

    #[test]
    fn includes_phase_name_and_active_prompt() {
        let builder = ContextPackBuilder::new(10_000, 50_000);
        let (prompt, report) = builder.build(&phase(), &[], Some("Ask for their name."), &[]);
        assert!(prompt.contains("Intro"));
        assert!(prompt.contains("Ask for their name."));
        assert_eq!(report.sections.len(), 1);
    }

    #[test]
    fn includes_collected_fields_and_recent_messages() {
        let builder = ContextPackBuilder::new(10_000, 50_000);
        let values = vec![FieldValue {
            session_id: "s1".into(),
            field_name: "name".into(),
            value: serde_json::json!("Alex"),
            collected_in_phase: "A".into(),
            type_tag: "string".into(),
            updated_at: Utc::now(),
        }];
        let messages = vec![Message {
            id: "m1".into(),
            session_id: "s1".into(),
            role: MessageRole::User,
            content: "Hi, I'm Alex".into(),
            message_type: MessageType::Regular,
            metadata: None,
            created_at: Utc::now(),
        }];

        let (prompt, report) = builder.build(&phase(), &values, None, &messages);
        assert!(prompt.contains("name: \"Alex\""));
        assert!(prompt.contains("User: Hi, I'm Alex"));
        assert_eq!(report.sections.len(), 3);
    }

    #[test]
    fn respects_total_cap() {
        let builder = ContextPackBuilder::new(10_000, 5);
        let (prompt, report) = builder.build(&phase(), &[], None, &[]);
        assert!(prompt.len() <= 5 + "\n\n[TRUNCATED_TOTAL_CAP]\n".len() + 1);
        assert!(report.total_injected_chars <= prompt.len());
    }
}
