//! Workflow Catalog: loads phases, fields, transitions, and prompts from
//! a workflow definition file and serves them from an in-memory snapshot.
//!
//! Reads never touch disk; a background watcher (driven by `pf-gateway`)
//! calls `check_and_reload` on a timer and rebuilds the snapshot only when
//! the definition's `updated_at` watermark has advanced.

mod definition;
mod snapshot;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use pf_domain::model::{Phase, PhaseField, Prompt};

pub use definition::WorkflowDefinition;
pub use snapshot::Snapshot;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("reading workflow definition {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing workflow definition {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid workflow definition: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

pub struct Catalog {
    path: PathBuf,
    snapshot: RwLock<Arc<Snapshot>>,
    watermark: RwLock<DateTime<Utc>>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self> {
        let (snapshot, watermark) = load_snapshot(path)?;
        tracing::info!(
            path = %path.display(),
            phases = snapshot.all_phases().len(),
            "workflow catalog loaded"
        );
        Ok(Self {
            path: path.to_path_buf(),
            snapshot: RwLock::new(Arc::new(snapshot)),
            watermark: RwLock::new(watermark),
        })
    }

    fn current(&self) -> Arc<Snapshot> {
        self.snapshot.read().clone()
    }

    pub fn get_phase(&self, id: &str) -> Option<Phase> {
        self.current().get_phase(id).cloned()
    }

    pub fn all_phases(&self) -> Vec<Phase> {
        self.current().all_phases().to_vec()
    }

    pub fn get_fields(&self, phase_id: &str) -> Vec<PhaseField> {
        self.current().get_fields(phase_id).to_vec()
    }

    /// Resolve the target phase id for a phase completing. When a
    /// branching field is declared for `phase_id` and `branch_value`
    /// names a reachable phase, that phase wins; otherwise falls back to
    /// position-based advance (spec §4.C `next_phase`).
    pub fn get_next(&self, phase_id: &str, branch_value: Option<&str>) -> Option<Phase> {
        let snap = self.current();
        if let Some(value) = branch_value {
            if snap.branching_field(phase_id).is_some() {
                if let Some(phase) = snap.get_phase(value) {
                    return Some(phase.clone());
                }
            }
        }
        snap.next_by_position(phase_id).cloned()
    }

    /// Resolve an arbitrary transition target token: a phase id, `"next"`,
    /// or a numeric position string (spec §4.C `validate_transition`).
    pub fn resolve_target(&self, from_phase_id: &str, raw: &str) -> Option<Phase> {
        self.current().resolve_target(from_phase_id, raw).cloned()
    }

    pub fn branching_field(&self, phase_id: &str) -> Option<String> {
        self.current().branching_field(phase_id).map(str::to_owned)
    }

    pub fn get_active_prompt(&self, category: &str, phase_id: Option<&str>) -> Option<Prompt> {
        self.current()
            .get_active_prompt(category, phase_id)
            .cloned()
    }

    /// Force a reload regardless of the watermark. Used by `doctor` / CLI.
    pub fn reload(&self) -> Result<()> {
        let (snapshot, watermark) = load_snapshot(&self.path)?;
        let phases = snapshot.all_phases().len();
        *self.snapshot.write() = Arc::new(snapshot);
        *self.watermark.write() = watermark;
        tracing::info!(phases, "workflow catalog reloaded");
        Ok(())
    }

    /// Check the definition's `updated_at` without a full reparse; reload
    /// only if it advanced. Returns whether a reload happened.
    pub fn check_and_reload(&self) -> Result<bool> {
        let raw = std::fs::read_to_string(&self.path).map_err(|source| CatalogError::Read {
            path: self.path.clone(),
            source,
        })?;
        let def: WorkflowDefinition =
            toml::from_str(&raw).map_err(|source| CatalogError::Parse {
                path: self.path.clone(),
                source,
            })?;

        if def.updated_at <= *self.watermark.read() {
            return Ok(false);
        }

        let snapshot = Snapshot::build(def).map_err(CatalogError::Invalid)?;
        let phases = snapshot.all_phases().len();
        *self.snapshot.write() = Arc::new(snapshot);
        tracing::info!(phases, "workflow catalog hot-reloaded");
        Ok(true)
    }
}

fn load_snapshot(path: &Path) -> Result<(Snapshot, DateTime<Utc>)> {
    let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let def: WorkflowDefinition = toml::from_str(&raw).map_err(|source| CatalogError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let watermark = def.updated_at;
    let snapshot = Snapshot::build(def).map_err(CatalogError::Invalid)?;
    Ok((snapshot, watermark))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_def(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    const SAMPLE: &str = r#"
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
display_name = "Waiting"
type = "timed_waiting"
wait_duration_seconds = 3

[[field]]
phase_id = "A"
name = "name"
required = true

[[transition]]
from_phase_id = "A"
to_phase_id = "B"
guard = "all_required_present"
"#;

    #[test]
    fn loads_phases_and_fields() {
        let f = write_def(SAMPLE);
        let catalog = Catalog::load(f.path()).unwrap();
        assert_eq!(catalog.all_phases().len(), 2);
        let fields = catalog.get_fields("A");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, "name");
    }

    #[test]
    fn get_next_falls_back_to_position() {
        let f = write_def(SAMPLE);
        let catalog = Catalog::load(f.path()).unwrap();
        let next = catalog.get_next("A", None).unwrap();
        assert_eq!(next.id, "B");
    }

    #[test]
    fn check_and_reload_is_noop_without_watermark_bump() {
        let f = write_def(SAMPLE);
        let catalog = Catalog::load(f.path()).unwrap();
        assert!(!catalog.check_and_reload().unwrap());
    }

    #[test]
    fn check_and_reload_picks_up_watermark_bump() {
        let f = write_def(SAMPLE);
        let catalog = Catalog::load(f.path()).unwrap();

        let bumped = SAMPLE.replacen("2026-01-01T00:00:00Z", "2026-01-02T00:00:00Z", 1);
        std::fs::write(f.path(), bumped).unwrap();

        assert!(catalog.check_and_reload().unwrap());
    }
}
