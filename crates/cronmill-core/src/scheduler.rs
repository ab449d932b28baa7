//! The scheduling engine: materialize, execute, recover, prune.
//!
//! One invocation runs three sequential phases. `schedule` materializes a
//! pending instance for every registered job and every matching minute up
//! to the configured horizon. `process` executes due pending instances,
//! taking the per-instance lock by a durable compare-and-swap against the
//! store. `cleanup` returns presumed-crashed running instances to pending
//! and prunes old history. Concurrency safety comes entirely from the
//! store: any number of invocations may race on different processes or
//! hosts, and each instance still executes at most once.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::expr;
use crate::registry::JobRegistry;
use crate::store::JobStore;
use crate::{JobInstance, JobStatus, minute_floor};

/// Error recorded on a due instance that waited past the schedule lifetime.
const MSG_TOO_LATE: &str = "too late for job";

pub struct Scheduler {
    store: Arc<dyn JobStore>,
    registry: JobRegistry,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(store: Arc<dyn JobStore>, registry: JobRegistry, config: SchedulerConfig) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    /// One full invocation: schedule, then process, then cleanup.
    pub async fn run(&self) -> Result<(), SchedulerError> {
        self.schedule().await?;
        self.process().await?;
        self.cleanup().await
    }

    /// Materialize pending instances for every registered job, one candidate
    /// minute at a time from now through the schedule-ahead horizon.
    ///
    /// Deduplication is per (code, minute): the currently-pending set is
    /// snapshotted once, and instances created within this call join the
    /// snapshot, so re-running with no time elapsed creates nothing.
    pub async fn schedule(&self) -> Result<(), SchedulerError> {
        let now = Utc::now();
        let mut seen: HashSet<(String, i64)> = self
            .store
            .find_pending()
            .await?
            .iter()
            .map(|job| (job.code.clone(), job.schedule_time.timestamp()))
            .collect();

        let mut created = 0usize;
        for def in self.registry.iter() {
            for offset in 0..self.config.schedule_ahead {
                let candidate = minute_floor(now + Duration::minutes(i64::from(offset)));
                let key = (def.code.clone(), candidate.timestamp());
                if seen.contains(&key) {
                    continue;
                }
                let due = expr::matches(&def.schedule, candidate).map_err(|source| {
                    SchedulerError::Expression {
                        code: def.code.clone(),
                        source,
                    }
                })?;
                if !due {
                    continue;
                }
                let job = JobInstance::pending(&def.code, now, candidate);
                self.store.persist(&job).await?;
                seen.insert(key);
                created += 1;
            }
        }

        self.store.flush().await?;
        if created > 0 {
            info!(created, "scheduled new job instances");
        }
        Ok(())
    }

    /// Execute every due pending instance, at most once per instance across
    /// all concurrent invocations.
    pub async fn process(&self) -> Result<(), SchedulerError> {
        let now = Utc::now();
        let missed_before = now - Duration::minutes(i64::from(self.config.schedule_lifetime));

        for mut job in self.store.find_pending().await? {
            if job.schedule_time > now {
                // not yet due
                continue;
            }

            if job.schedule_time < missed_before {
                warn!(id = %job.id, code = %job.code, "job missed its schedule window");
                job.status = JobStatus::Missed;
                job.error_msg = Some(MSG_TOO_LATE.to_string());
                self.store.persist(&job).await?;
                continue;
            }

            let Some(def) = self.registry.get(&job.code) else {
                warn!(id = %job.id, code = %job.code, "due job has no registration");
                job.status = JobStatus::Error;
                job.error_msg = Some(format!(
                    "job \"{}\" undefined in cron registry",
                    job.code
                ));
                self.store.persist(&job).await?;
                continue;
            };

            // The durable compare-and-swap is the lock. Losing it means a
            // concurrent invocation got here first; back off silently.
            if !self
                .store
                .try_transition(&job.id, JobStatus::Pending, JobStatus::Running)
                .await?
            {
                debug!(id = %job.id, code = %job.code, "lost locking race, skipping");
                continue;
            }
            job.status = JobStatus::Running;
            job.execute_time = Some(Utc::now());
            self.store.persist(&job).await?;

            info!(id = %job.id, code = %job.code, "executing job");
            match tokio::spawn(def.invoke()).await {
                Ok(Ok(())) => {
                    job.status = JobStatus::Success;
                    job.finish_time = Some(Utc::now());
                }
                Ok(Err(err)) => {
                    warn!(id = %job.id, code = %job.code, "job failed: {err:#}");
                    job.status = JobStatus::Error;
                    job.error_msg = Some(format!("{err:#}"));
                    job.stack_trace = Some(format!("{err:?}"));
                }
                Err(join_err) => {
                    warn!(id = %job.id, code = %job.code, "job panicked");
                    job.status = JobStatus::Error;
                    job.error_msg = Some(join_err.to_string());
                    job.stack_trace = Some(format!("{join_err:?}"));
                }
            }
            self.store.persist(&job).await?;
        }

        self.store.flush().await?;
        Ok(())
    }

    /// Recover instances presumed crashed mid-run and prune old history.
    pub async fn cleanup(&self) -> Result<(), SchedulerError> {
        let now = Utc::now();

        for job in self.store.find_history().await? {
            let lifetime = match job.status {
                JobStatus::Success => self.config.success_log_lifetime,
                _ => self.config.failure_log_lifetime,
            };
            let cutoff = now - Duration::minutes(i64::from(lifetime));
            // missed instances never ran; age them by schedule time instead
            let aged_out = match job.execute_time {
                Some(t) => t < cutoff,
                None => job.schedule_time < cutoff,
            };
            if aged_out {
                debug!(id = %job.id, code = %job.code, status = %job.status, "pruning history record");
                self.store.remove(&job.id).await?;
            }
        }

        let stale_before = now - Duration::minutes(i64::from(self.config.max_running_time));
        for mut job in self.store.find_running().await? {
            if !job.execute_time.is_some_and(|t| t < stale_before) {
                continue;
            }
            warn!(id = %job.id, code = %job.code, "recovering job running past its limit");
            job.status = JobStatus::Pending;
            job.schedule_time = minute_floor(now);
            job.execute_time = None;
            job.error_msg = None;
            job.stack_trace = None;
            self.store.persist(&job).await?;
        }

        self.store.flush().await?;
        Ok(())
    }
}
