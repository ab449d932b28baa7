//! cronmill-store: SQLite-backed job instance storage.
//!
//! Implements the core [`JobStore`] contract over a single SQLite database
//! in WAL mode. The compare-and-swap lock is a conditional `UPDATE` on the
//! status column; SQLite serializes writers, so whichever invocation's
//! update lands first wins the race and the loser sees zero affected rows.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use tokio::sync::Mutex;

use cronmill_core::store::JobStore;
use cronmill_core::{JobInstance, JobStatus};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS cron_jobs (
    id TEXT PRIMARY KEY,
    code TEXT NOT NULL,
    status TEXT NOT NULL,
    create_time TEXT NOT NULL,
    schedule_time TEXT NOT NULL,
    execute_time TEXT,
    finish_time TEXT,
    error_msg TEXT,
    stack_trace TEXT
);

CREATE INDEX IF NOT EXISTS idx_cron_jobs_status ON cron_jobs(status);";

/// Persistent storage for job instances.
pub struct SqliteJobStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteJobStore {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.execute_batch(SCHEMA)?;
        tracing::info!("Job store opened: {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Get one instance by id.
    pub async fn get(&self, id: &str) -> Result<Option<JobInstance>> {
        let conn = self.conn.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<JobInstance>> {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM cron_jobs WHERE id = ?1"
            ))?;
            let job = stmt
                .query_row(rusqlite::params![id], row_to_job)
                .optional()?;
            Ok(job)
        })
        .await?
    }
}

const COLUMNS: &str = "id, code, status, create_time, schedule_time, execute_time, finish_time, error_msg, stack_trace";

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn find_by_status(&self, status: JobStatus) -> Result<Vec<JobInstance>> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<JobInstance>> {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM cron_jobs WHERE status = ?1 ORDER BY schedule_time ASC"
            ))?;
            let jobs = stmt
                .query_map(rusqlite::params![status.as_str()], row_to_job)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(jobs)
        })
        .await?
    }

    async fn find_history(&self) -> Result<Vec<JobInstance>> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<JobInstance>> {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM cron_jobs
                 WHERE status IN ('success', 'missed', 'error')
                 ORDER BY schedule_time ASC"
            ))?;
            let jobs = stmt
                .query_map([], row_to_job)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(jobs)
        })
        .await?
    }

    async fn persist(&self, job: &JobInstance) -> Result<()> {
        let conn = self.conn.clone();
        let job = job.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = conn.blocking_lock();
            conn.execute(
                "INSERT OR REPLACE INTO cron_jobs
                    (id, code, status, create_time, schedule_time, execute_time, finish_time, error_msg, stack_trace)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    job.id,
                    job.code,
                    job.status.as_str(),
                    job.create_time.to_rfc3339(),
                    job.schedule_time.to_rfc3339(),
                    job.execute_time.map(|t| t.to_rfc3339()),
                    job.finish_time.map(|t| t.to_rfc3339()),
                    job.error_msg,
                    job.stack_trace,
                ],
            )?;
            Ok(())
        })
        .await?
    }

    async fn remove(&self, id: &str) -> Result<()> {
        let conn = self.conn.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = conn.blocking_lock();
            conn.execute("DELETE FROM cron_jobs WHERE id = ?1", rusqlite::params![id])?;
            Ok(())
        })
        .await?
    }

    async fn try_transition(
        &self,
        id: &str,
        expected: JobStatus,
        next: JobStatus,
    ) -> Result<bool> {
        let conn = self.conn.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || -> Result<bool> {
            let conn = conn.blocking_lock();
            // the conditional write is atomic; losing racers update 0 rows
            let changed = conn.execute(
                "UPDATE cron_jobs SET status = ?2 WHERE id = ?1 AND status = ?3",
                rusqlite::params![id, next.as_str(), expected.as_str()],
            )?;
            Ok(changed > 0)
        })
        .await?
    }
}

fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<JobInstance> {
    let status: String = row.get(2)?;
    let status: JobStatus = status.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown job status: {status}").into(),
        )
    })?;
    Ok(JobInstance {
        id: row.get(0)?,
        code: row.get(1)?,
        status,
        create_time: get_time(row, 3)?,
        schedule_time: get_time(row, 4)?,
        execute_time: get_opt_time(row, 5)?,
        finish_time: get_opt_time(row, 6)?,
        error_msg: row.get(7)?,
        stack_trace: row.get(8)?,
    })
}

fn get_time(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: chrono::ParseError| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn get_opt_time(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        None => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|e: chrono::ParseError| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use cronmill_core::minute_floor;

    fn instance(code: &str, status: JobStatus, minutes_ago: i64) -> JobInstance {
        let now = Utc::now();
        let mut job =
            JobInstance::pending(code, now, minute_floor(now - Duration::minutes(minutes_ago)));
        job.status = status;
        job
    }

    #[tokio::test]
    async fn persist_and_get_round_trip() {
        let store = SqliteJobStore::open_in_memory().unwrap();
        let mut job = instance("ping", JobStatus::Error, 5);
        job.execute_time = Some(minute_floor(Utc::now()));
        job.error_msg = Some("boom".to_string());
        job.stack_trace = Some("trace".to_string());
        store.persist(&job).await.unwrap();

        let loaded = store.get(&job.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, job.id);
        assert_eq!(loaded.code, "ping");
        assert_eq!(loaded.status, JobStatus::Error);
        assert_eq!(loaded.create_time, job.create_time);
        assert_eq!(loaded.schedule_time, job.schedule_time);
        assert_eq!(loaded.execute_time, job.execute_time);
        assert_eq!(loaded.finish_time, None);
        assert_eq!(loaded.error_msg.as_deref(), Some("boom"));
        assert_eq!(loaded.stack_trace.as_deref(), Some("trace"));
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let store = SqliteJobStore::open_in_memory().unwrap();
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn persist_is_an_upsert() {
        let store = SqliteJobStore::open_in_memory().unwrap();
        let mut job = instance("ping", JobStatus::Pending, 5);
        store.persist(&job).await.unwrap();

        job.status = JobStatus::Success;
        job.finish_time = Some(Utc::now());
        store.persist(&job).await.unwrap();

        let loaded = store.get(&job.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Success);
        assert!(loaded.finish_time.is_some());
        assert_eq!(store.find_pending().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn find_by_status_orders_by_schedule_time() {
        let store = SqliteJobStore::open_in_memory().unwrap();
        let later = instance("b", JobStatus::Pending, 5);
        let earlier = instance("a", JobStatus::Pending, 30);
        store.persist(&later).await.unwrap();
        store.persist(&earlier).await.unwrap();
        store
            .persist(&instance("c", JobStatus::Running, 10))
            .await
            .unwrap();

        let pending = store.find_pending().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, earlier.id);
        assert_eq!(pending[1].id, later.id);

        let running = store.find_running().await.unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].code, "c");
    }

    #[tokio::test]
    async fn find_history_covers_terminal_statuses_only() {
        let store = SqliteJobStore::open_in_memory().unwrap();
        for (code, status) in [
            ("a", JobStatus::Pending),
            ("b", JobStatus::Running),
            ("c", JobStatus::Success),
            ("d", JobStatus::Missed),
            ("e", JobStatus::Error),
        ] {
            store.persist(&instance(code, status, 5)).await.unwrap();
        }

        let history = store.find_history().await.unwrap();
        let mut codes: Vec<&str> = history.iter().map(|j| j.code.as_str()).collect();
        codes.sort();
        assert_eq!(codes, vec!["c", "d", "e"]);
    }

    #[tokio::test]
    async fn try_transition_swaps_only_from_the_expected_status() {
        let store = SqliteJobStore::open_in_memory().unwrap();
        let job = instance("ping", JobStatus::Pending, 5);
        store.persist(&job).await.unwrap();

        let locked = store
            .try_transition(&job.id, JobStatus::Pending, JobStatus::Running)
            .await
            .unwrap();
        assert!(locked);

        // second lock attempt loses: status is no longer pending
        let locked_again = store
            .try_transition(&job.id, JobStatus::Pending, JobStatus::Running)
            .await
            .unwrap();
        assert!(!locked_again);

        let loaded = store.get(&job.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Running);
    }

    #[tokio::test]
    async fn try_transition_on_missing_row_fails() {
        let store = SqliteJobStore::open_in_memory().unwrap();
        let locked = store
            .try_transition("ghost", JobStatus::Pending, JobStatus::Running)
            .await
            .unwrap();
        assert!(!locked);
    }

    #[tokio::test]
    async fn remove_deletes_the_row() {
        let store = SqliteJobStore::open_in_memory().unwrap();
        let job = instance("ping", JobStatus::Success, 5);
        store.persist(&job).await.unwrap();
        store.remove(&job.id).await.unwrap();
        assert!(store.get(&job.id).await.unwrap().is_none());
    }
}
