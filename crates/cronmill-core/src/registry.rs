//! Process-local job registry.
//!
//! The registry is rebuilt from scratch on every process start by explicit
//! `register` calls; there is no persistence and no merge across runs. It is
//! an ordinary value passed into the scheduler, not a process-wide global.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed async job body. Arguments are bound at registration time by
/// closure capture; invocation takes none.
pub type JobFn =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send + Sync>;

/// One registered job: a recurrence expression and the body to run.
#[derive(Clone)]
pub struct JobDefinition {
    pub code: String,
    pub schedule: String,
    run: JobFn,
}

impl JobDefinition {
    /// Start one execution of the job body.
    pub fn invoke(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> {
        (self.run)()
    }
}

impl std::fmt::Debug for JobDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobDefinition")
            .field("code", &self.code)
            .field("schedule", &self.schedule)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("job code must be a non-empty string")]
    EmptyCode,
}

/// Mapping from job code to definition. One definition per code;
/// re-registering a code replaces it.
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: HashMap<String, JobDefinition>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: HashMap::new(),
        }
    }

    /// Register the job body to run under `code` on the given five-field
    /// cron `schedule`. The schedule itself is validated when the scheduler
    /// first evaluates it.
    pub fn register<F, Fut>(
        &mut self,
        code: &str,
        schedule: &str,
        body: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        if code.is_empty() {
            return Err(RegistryError::EmptyCode);
        }
        let run: JobFn = Arc::new(move || Box::pin(body()));
        self.jobs.insert(
            code.to_string(),
            JobDefinition {
                code: code.to_string(),
                schedule: schedule.to_string(),
                run,
            },
        );
        Ok(())
    }

    pub fn get(&self, code: &str) -> Option<&JobDefinition> {
        self.jobs.get(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.jobs.contains_key(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &JobDefinition> {
        self.jobs.values()
    }

    /// The full code-to-definition mapping.
    pub fn all(&self) -> &HashMap<String, JobDefinition> {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
