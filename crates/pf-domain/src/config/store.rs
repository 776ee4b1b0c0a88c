use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the sqlite database file. `database_url` in spec §6's
    /// recognized process options.
    #[serde(default = "d_database_url")]
    pub database_url: PathBuf,
    /// How often a WAL checkpoint runs, independent of backup snapshots.
    #[serde(default = "d_checkpoint_interval_sec")]
    pub checkpoint_interval_sec: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: d_database_url(),
            checkpoint_interval_sec: d_checkpoint_interval_sec(),
        }
    }
}

fn d_database_url() -> PathBuf {
    PathBuf::from("./data/phaseforge.sqlite3")
}
fn d_checkpoint_interval_sec() -> u64 {
    300
}
