//! Storage seam for job instances.

use anyhow::Result;
use async_trait::async_trait;

use crate::{JobInstance, JobStatus};

/// Durable collection of job instances shared by every scheduler process.
///
/// The store is the sole synchronization medium between invocations:
/// [`JobStore::try_transition`] must be an atomic compare-and-swap on the
/// stored status, durable before it returns, because the winning write is
/// the lock that gives exactly-once execution.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// All instances with the given status, schedule time ascending.
    async fn find_by_status(&self, status: JobStatus) -> Result<Vec<JobInstance>>;

    /// Terminal instances: success, missed and error.
    async fn find_history(&self) -> Result<Vec<JobInstance>>;

    /// Insert or update an instance by id, durably.
    async fn persist(&self, job: &JobInstance) -> Result<()>;

    /// Delete an instance by id.
    async fn remove(&self, id: &str) -> Result<()>;

    /// Atomically set the status of `id` to `next` iff the stored status
    /// still equals `expected`. Returns whether the swap landed.
    async fn try_transition(
        &self,
        id: &str,
        expected: JobStatus,
        next: JobStatus,
    ) -> Result<bool>;

    /// Transactional boundary marker between scheduler phases. Autocommit
    /// backends may treat this as a no-op.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    async fn find_pending(&self) -> Result<Vec<JobInstance>> {
        self.find_by_status(JobStatus::Pending).await
    }

    async fn find_running(&self) -> Result<Vec<JobInstance>> {
        self.find_by_status(JobStatus::Running).await
    }
}
