//! End-of-round reporting.
//!
//! Line builders are pure so the truncation rules can be tested; the `log_*`
//! wrappers route them to the logger.

use std::time::Duration;

use super::BuildError;
use crate::pool::{JobRecord, RoundStats};

/// Maximum number of errors or jobs printed after a round.
pub const MAX_MESSAGES: usize = 10;

const TOO_MANY_ERRORS: &str = "... too many errors (limit reached)";
const TOO_MANY_JOBS: &str = "... many jobs executed (limit reached)";

pub(super) fn error_lines(errors: &[BuildError]) -> Vec<String> {
    let mut lines: Vec<String> = errors
        .iter()
        .take(MAX_MESSAGES)
        .map(|err| match err {
            BuildError::Planning(e) => format!("Build error: {e:#}"),
            BuildError::Job(job) => format!("Job error: {job}"),
        })
        .collect();

    if errors.len() > MAX_MESSAGES {
        lines.push(TOO_MANY_ERRORS.to_string());
    }
    lines
}

/// Executed jobs, slowest first, capped at [`MAX_MESSAGES`].
pub(super) fn slowest_job_lines(jobs: &[JobRecord]) -> Vec<String> {
    if jobs.is_empty() {
        return Vec::new();
    }

    let mut sorted: Vec<&JobRecord> = jobs.iter().collect();
    sorted.sort_by(|a, b| b.duration.cmp(&a.duration));

    let mut lines = vec!["Jobs executed (slowest first):".to_string()];
    lines.extend(
        sorted
            .iter()
            .take(MAX_MESSAGES)
            .map(|job| format!("    {} (time: {:.2?})", job.name, job.duration)),
    );

    if jobs.len() > MAX_MESSAGES {
        lines.push(TOO_MANY_JOBS.to_string());
    }
    lines
}

pub(super) fn summary_line(stats: &RoundStats, build_duration: Duration) -> String {
    format!(
        "built in {:.2?} ({} / {} job(s) did work; {} errored; loop took {:.2?})",
        build_duration,
        stats.num_jobs_executed,
        stats.num_jobs,
        stats.num_jobs_errored,
        stats.loop_duration,
    )
}

pub(super) fn log_round(errors: &[BuildError], stats: &RoundStats, build_duration: Duration) {
    for line in error_lines(errors) {
        crate::error!("build"; "{}", line);
    }
    for line in slowest_job_lines(&stats.jobs_executed) {
        crate::log!("build"; "{}", line);
    }
    crate::log!("build"; "{}", summary_line(stats, build_duration));
}
