use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Path to the workflow definition (phases/fields/transitions/prompts)
    /// loaded by the Workflow Catalog at startup.
    #[serde(default = "d_path")]
    pub definition_path: PathBuf,
    /// How often the catalog checks the definition's `updated_at`
    /// watermark for hot-reload (spec §4.A, supplemented per SPEC_FULL.md).
    #[serde(default = "d_reload_interval_sec")]
    pub reload_check_interval_sec: u64,
    /// Number of recent messages included in the initial snapshot
    /// (spec §4.E).
    #[serde(default = "d_snapshot_messages")]
    pub initial_snapshot_messages: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            definition_path: d_path(),
            reload_check_interval_sec: d_reload_interval_sec(),
            initial_snapshot_messages: d_snapshot_messages(),
        }
    }
}

fn d_path() -> PathBuf {
    PathBuf::from("./workflows/brainspotting.toml")
}
fn d_reload_interval_sec() -> u64 {
    30
}
fn d_snapshot_messages() -> u32 {
    50
}
