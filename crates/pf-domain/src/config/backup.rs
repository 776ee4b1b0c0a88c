use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Object-store bucket to snapshot into. `None` disables the scheduler
    /// (it becomes a no-op, per spec §4.G).
    #[serde(default)]
    pub backup_bucket: Option<String>,
    #[serde(default = "d_interval_min")]
    pub interval_minutes: u64,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            backup_bucket: None,
            interval_minutes: d_interval_min(),
        }
    }
}

fn d_interval_min() -> u64 {
    5
}
