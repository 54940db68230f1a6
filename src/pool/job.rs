use std::fmt;
use std::time::Duration;

use thiserror::Error;

type JobFn = Box<dyn FnOnce() -> anyhow::Result<bool> + Send + 'static>;

/// A named unit of work.
///
/// The closure returns `Ok(true)` when it did work, `Ok(false)` when there was
/// nothing to do (for example the output was already fresh), and `Err` when
/// it failed.
pub struct Job {
    name: String,
    f: JobFn,
}

impl Job {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<bool> + Send + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(f),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(super) fn into_parts(self) -> (String, JobFn) {
        (self.name, self.f)
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").field("name", &self.name).finish()
    }
}

/// A job that did work (successfully or not) during a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub name: String,
    pub duration: Duration,
}

/// A job that failed during a round.
#[derive(Debug, Error)]
#[error("{error:#} (job: '{name}', time: {duration:.2?})")]
pub struct JobError {
    pub name: String,
    pub duration: Duration,
    pub error: anyhow::Error,
}
