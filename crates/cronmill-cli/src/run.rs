//! The `run` subcommand — trigger scheduler invocations.

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};

use cronmill_core::{JobRegistry, Scheduler};
use cronmill_store::SqliteJobStore;

use crate::config::CronmillConfig;

pub async fn run(config: CronmillConfig, watch: bool, interval: u64) -> anyhow::Result<()> {
    let db_path = config.resolve_db_path()?;
    if let Some(dir) = db_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let store = Arc::new(SqliteJobStore::open(&db_path)?);

    let mut registry = JobRegistry::new();
    for (code, spec) in &config.jobs {
        let command = spec.command.clone();
        registry
            .register(code, &spec.schedule, move || run_command(command.clone()))
            .with_context(|| format!("registering job \"{code}\""))?;
    }
    info!("Registered {} jobs", registry.len());

    let scheduler = Scheduler::new(store, registry, config.scheduler.clone());

    if !watch {
        scheduler.run().await?;
        return Ok(());
    }

    loop {
        // a failed pass is retried by the next one
        if let Err(err) = scheduler.run().await {
            error!("scheduler pass failed: {err}");
        }
        tokio::time::sleep(tokio::time::Duration::from_secs(interval)).await;
    }
}

/// Run a shell command, failing if it exits non-zero.
async fn run_command(command: String) -> anyhow::Result<()> {
    let status = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(&command)
        .status()
        .await?;
    if !status.success() {
        anyhow::bail!("command exited with {status}");
    }
    Ok(())
}
