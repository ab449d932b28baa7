//! The `status` subcommand — inspect the job store.

use cronmill_core::JobStatus;
use cronmill_core::store::JobStore;
use cronmill_store::SqliteJobStore;

use crate::config::CronmillConfig;

pub async fn run(config: CronmillConfig) -> anyhow::Result<()> {
    let store = SqliteJobStore::open(&config.resolve_db_path()?)?;

    for status in [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Success,
        JobStatus::Missed,
        JobStatus::Error,
    ] {
        let count = store.find_by_status(status).await?.len();
        println!("{status}: {count}");
    }

    let mut history = store.find_history().await?;
    history.sort_by_key(|job| std::cmp::Reverse(job.execute_time.unwrap_or(job.schedule_time)));
    if !history.is_empty() {
        println!("\nrecent history:");
    }
    for job in history.iter().take(10) {
        let when = job.execute_time.unwrap_or(job.schedule_time);
        match &job.error_msg {
            Some(msg) => println!(
                "  {} {} {} ({msg})",
                when.format("%Y-%m-%d %H:%M"),
                job.status,
                job.code
            ),
            None => println!(
                "  {} {} {}",
                when.format("%Y-%m-%d %H:%M"),
                job.status,
                job.code
            ),
        }
    }

    Ok(())
}
