//! cronmill-core: persistent recurring-job scheduling engine.
//!
//! Callers register named jobs with a five-field cron expression; the
//! scheduler materializes concrete instances ahead of time, executes due
//! instances exactly once even when several scheduler processes race against
//! the same store, recovers instances that crashed mid-run, and prunes old
//! history. The only synchronization medium is the durable [`store::JobStore`];
//! there is no in-memory coordination between invocations.

pub mod config;
pub mod error;
pub mod expr;
pub mod registry;
pub mod scheduler;
pub mod store;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use registry::{JobRegistry, RegistryError};
pub use scheduler::Scheduler;
pub use store::JobStore;

/// Lifecycle state of a job instance.
///
/// `Success`, `Missed` and `Error` are terminal, except that the cleanup
/// sweep may return a presumed-crashed `Running` instance to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Success,
    Missed,
    Error,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Missed => "missed",
            JobStatus::Error => "error",
        }
    }

    /// Terminal instances form the history set swept by retention.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Missed | JobStatus::Error)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "success" => Ok(JobStatus::Success),
            "missed" => Ok(JobStatus::Missed),
            "error" => Ok(JobStatus::Error),
            other => Err(anyhow::anyhow!("unknown job status: {other}")),
        }
    }
}

/// One concrete scheduled execution of a registered job.
///
/// Owned by the store; the scheduler holds transient copies while iterating
/// a query result and persists every mutation before moving on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInstance {
    /// Unique instance ID, assigned at creation and immutable after.
    pub id: String,
    /// Code of the definition this instance was scheduled from. May become
    /// orphaned if the code is no longer registered.
    pub code: String,
    pub status: JobStatus,
    /// When the instance was materialized.
    pub create_time: DateTime<Utc>,
    /// The minute this instance is due, always at whole-minute resolution.
    pub schedule_time: DateTime<Utc>,
    /// Set when execution was actually attempted; never set on missed
    /// instances.
    pub execute_time: Option<DateTime<Utc>>,
    /// Set on successful completion only.
    pub finish_time: Option<DateTime<Utc>>,
    pub error_msg: Option<String>,
    pub stack_trace: Option<String>,
}

impl JobInstance {
    /// Create a pending instance of `code` due at `schedule_time`.
    pub fn pending(code: &str, create_time: DateTime<Utc>, schedule_time: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            code: code.to_string(),
            status: JobStatus::Pending,
            create_time,
            schedule_time,
            execute_time: None,
            finish_time: None,
            error_msg: None,
            stack_trace: None,
        }
    }
}

/// Truncate an instant to whole-minute resolution.
pub fn minute_floor(t: DateTime<Utc>) -> DateTime<Utc> {
    t.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}
