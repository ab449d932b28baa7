//! Scheduler timing configuration.

use serde::{Deserialize, Serialize};

/// Timing knobs for the scheduling engine. All values are minutes; zero is
/// legal and means "immediate".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How far ahead to materialize pending instances.
    #[serde(default = "default_schedule_ahead")]
    pub schedule_ahead: u32,
    /// How long a due instance may wait before it is considered missed.
    #[serde(default = "default_schedule_lifetime")]
    pub schedule_lifetime: u32,
    /// How long an instance may run before it is presumed crashed and
    /// recovered by cleanup.
    #[serde(default = "default_max_running_time")]
    pub max_running_time: u32,
    /// How long to keep successful history records.
    #[serde(default = "default_success_log_lifetime")]
    pub success_log_lifetime: u32,
    /// How long to keep missed and errored history records.
    #[serde(default = "default_failure_log_lifetime")]
    pub failure_log_lifetime: u32,
}

fn default_schedule_ahead() -> u32 {
    60
}

fn default_schedule_lifetime() -> u32 {
    15
}

fn default_max_running_time() -> u32 {
    60
}

fn default_success_log_lifetime() -> u32 {
    1440 // one day
}

fn default_failure_log_lifetime() -> u32 {
    10080 // one week
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            schedule_ahead: default_schedule_ahead(),
            schedule_lifetime: default_schedule_lifetime(),
            max_running_time: default_max_running_time(),
            success_log_lifetime: default_success_log_lifetime(),
            failure_log_lifetime: default_failure_log_lifetime(),
        }
    }
}
