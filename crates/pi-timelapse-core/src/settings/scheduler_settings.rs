use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Schedule evaluator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Period of the schedule evaluator.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
}

impl SchedulerSettings {
    pub(crate) fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs.max(1))
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
        }
    }
}

fn default_tick_secs() -> u64 {
    5
}
