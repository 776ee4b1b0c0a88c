//! Prompt assembly / context builder (spec §1: "out of scope, consumed
//! as given session id and phase id, return a prompt string"). A thin
//! trait plus one concrete implementation reading from the Catalog and
//! Store, delegating the actual formatting to the pure
//! [`builder::ContextPackBuilder`].

mod builder;
mod error;
pub mod report;
mod truncation;

pub use builder::ContextPackBuilder;
pub use error::{ContextPackError, Result};
pub use report::ContextReport;

use std::sync::Arc;

use pf_catalog::Catalog;
use pf_store::SessionStore;

const RECENT_MESSAGE_LIMIT: u32 = 20;
const MAX_PER_SECTION: usize = 8_000;
const TOTAL_MAX: usize = 16_000;

/// Given a session id and phase id, return a fully-assembled prompt
/// string. The sole seam between the orchestrator and prompt assembly.
#[async_trait::async_trait]
pub trait ContextBuilder: Send + Sync {
    async fn build_prompt(&self, session_id: &str, phase_id: &str) -> Result<String>;
}

/// Reads phase metadata, collected field values, the active
/// `"system"`-category prompt for the phase, and recent messages, then
/// assembles them with [`ContextPackBuilder`].
pub struct StoreContextBuilder {
    catalog: Arc<Catalog>,
    store: SessionStore,
    builder: ContextPackBuilder,
}

impl StoreContextBuilder {
    pub fn new(catalog: Arc<Catalog>, store: SessionStore) -> Self {
        Self {
            catalog,
            store,
            builder: ContextPackBuilder::new(MAX_PER_SECTION, TOTAL_MAX),
        }
    }
}

#[async_trait::async_trait]
impl ContextBuilder for StoreContextBuilder {
    async fn build_prompt(&self, session_id: &str, phase_id: &str) -> Result<String> {
        let phase = self
            .catalog
            .get_phase(phase_id)
            .ok_or_else(|| ContextPackError::PhaseNotFound(phase_id.to_owned()))?;
        let values = self.store.list_field_values(session_id).await?;
        let active_prompt = self.catalog.get_active_prompt("system", Some(phase_id));
        let recent = self
            .store
            .recent_messages(session_id, RECENT_MESSAGE_LIMIT)
            .await?;

        let (prompt, _report) = self.builder.build(
            &phase,
            &values,
            active_prompt.as_ref().map(|p| p.text.as_str()),
            &recent,
        );
        Ok(prompt)
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
description = "Greet the user"
type = "conversational"

[[prompt]]
name = "intro-system"
category = "system"
phase_id = "A"
text = "Ask the user for their name."
"#;

    #[tokio::test]
    async fn assembles_prompt_from_phase_and_active_prompt() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(WORKFLOW.as_bytes()).unwrap();
        let catalog = Arc::new(Catalog::load(f.path()).unwrap());
        let store = SessionStore::open_in_memory().await.unwrap();
        let session = store.create_session("u1", "op1", "A").await.unwrap();

        let builder = StoreContextBuilder::new(catalog, store);
        let prompt = builder.build_prompt(&session.id, "A").await.unwrap();

        assert!(prompt.contains("Intro"));
        assert!(prompt.contains("Ask the user for their name."));
    }

    #[tokio::test]
    async fn unknown_phase_is_an_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(WORKFLOW.as_bytes()).unwrap();
        let catalog = Arc::new(Catalog::load(f.path()).unwrap());
        let store = SessionStore::open_in_memory().await.unwrap();
        let session = store.create_session("u1", "op1", "A").await.unwrap();

        let builder = StoreContextBuilder::new(catalog, store);
        assert!(builder.build_prompt(&session.id, "ghost").await.is_err());
    }
}
