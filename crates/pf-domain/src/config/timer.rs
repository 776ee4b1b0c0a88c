use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "d_tick_interval_ms")]
    pub timer_tick_interval_ms: u64,
    #[serde(default = "d_inactivity_timeout_sec")]
    pub inactivity_timeout_seconds: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            timer_tick_interval_ms: d_tick_interval_ms(),
            inactivity_timeout_seconds: d_inactivity_timeout_sec(),
        }
    }
}

fn d_tick_interval_ms() -> u64 {
    1_000
}
fn d_inactivity_timeout_sec() -> u64 {
    120
}
