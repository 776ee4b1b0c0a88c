mod backup;
mod llm;
mod server;
mod store;
mod timer;
mod workflow;

pub use backup::*;
pub use llm::*;
pub use server::*;
pub use store::*;
pub use timer::*;
pub use workflow::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    /// `RUST_LOG`-style filter string; `log_level` in spec §6.
    #[serde(default = "d_log_level")]
    pub log_level: String,
}

fn d_log_level() -> String {
    "info,pf_gateway=debug".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate configuration, returning a list of issues. Errors block
    /// startup (see `phaseforge doctor` / `main::run_server`); warnings
    /// are logged and the server still starts.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.server.port == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be nonzero".into(),
            });
        }

        if !(0.0..=2.0).contains(&self.llm.ai_temperature) {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "llm.ai_temperature".into(),
                message: format!(
                    "temperature {} is outside the conventional 0.0-2.0 range",
                    self.llm.ai_temperature
                ),
            });
        }

        if self.llm.ai_max_tokens == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "llm.ai_max_tokens".into(),
                message: "ai_max_tokens must be nonzero".into(),
            });
        }

        if self.timer.timer_tick_interval_ms == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "timer.timer_tick_interval_ms".into(),
                message: "tick interval must be nonzero".into(),
            });
        }

        if self.backup.backup_bucket.is_none() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "backup.backup_bucket".into(),
                message: "no backup bucket configured — backup scheduler will be a no-op".into(),
            });
        }

        if !self.workflow.definition_path.exists() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "workflow.definition_path".into(),
                message: format!(
                    "{} does not exist yet — catalog will fail to load at startup",
                    self.workflow.definition_path.display()
                ),
            });
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_only_warnings() {
        let cfg = Config::default();
        let issues = cfg.validate();
        assert!(
            issues.iter().all(|i| i.severity == ConfigSeverity::Warning),
            "default config should not carry errors: {issues:?}"
        );
    }

    #[test]
    fn zero_port_is_an_error() {
        let mut cfg = Config::default();
        cfg.server.port = 0;
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|i| i.field == "server.port" && i.severity == ConfigSeverity::Error));
    }

    #[test]
    fn missing_backup_bucket_is_a_warning_not_an_error() {
        let cfg = Config::default();
        let issues = cfg.validate();
        let backup_issue = issues.iter().find(|i| i.field == "backup.backup_bucket");
        assert!(matches!(
            backup_issue,
            Some(ConfigIssue {
                severity: ConfigSeverity::Warning,
                ..
            })
        ));
    }
}
