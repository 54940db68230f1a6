//! Worker pool with per-round accounting.
//!
//! A fixed set of worker threads consumes jobs from a channel, so at most
//! `concurrency` jobs run at once. Rounds are delimited by [`Pool::start_round`]
//! and [`Pool::wait`]; every job enqueued in between is counted against the
//! round, including jobs enqueued by other jobs.
//!
//! ```text
//! start_round → enqueue* → wait → stats
//! ```

mod job;


pub use job::{Job, JobError, JobRecord};

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Condvar, Mutex};

/// Statistics for a single round.
#[derive(Debug, Clone)]
pub struct RoundStats {
    /// When the round started.
    pub start: Instant,
    /// Jobs enqueued this round.
    pub num_jobs: usize,
    /// Jobs that did work (including failed ones).
    pub num_jobs_executed: usize,
    /// Jobs that failed.
    pub num_jobs_errored: usize,
    /// Jobs that did work, in completion order.
    pub jobs_executed: Vec<JobRecord>,
    /// Time spent draining the queue in [`Pool::wait`].
    pub loop_duration: Duration,
}

impl RoundStats {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            num_jobs: 0,
            num_jobs_executed: 0,
            num_jobs_errored: 0,
            jobs_executed: Vec::new(),
            loop_duration: Duration::ZERO,
        }
    }
}

/// Mutable round bookkeeping shared by the pool handle and its workers.
struct Round {
    /// Jobs enqueued but not yet finished.
    pending: usize,
    stats: RoundStats,
    errors: Vec<JobError>,
}

struct Shared {
    round: Mutex<Round>,
    /// Fired when `pending` drops to zero.
    drained: Condvar,
}

/// Bounded-concurrency job executor.
///
/// Cloning yields another handle to the same workers, which lets running jobs
/// enqueue follow-up work. Workers exit once every handle is dropped.
#[derive(Clone)]
pub struct Pool {
    shared: Arc<Shared>,
    job_tx: Sender<Job>,
    concurrency: usize,
}

impl Pool {
    /// Spawn `concurrency` worker threads (at least one).
    pub fn new(concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        let (job_tx, job_rx) = channel::unbounded::<Job>();
        let shared = Arc::new(Shared {
            round: Mutex::new(Round {
                pending: 0,
                stats: RoundStats::new(),
                errors: Vec::new(),
            }),
            drained: Condvar::new(),
        });

        for _ in 0..concurrency {
            let job_rx = job_rx.clone();
            let shared = Arc::clone(&shared);
            thread::spawn(move || run_worker(&job_rx, &shared));
        }

        Self {
            shared,
            job_tx,
            concurrency,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Reset counters for a new round.
    ///
    /// Only valid once the previous round's [`wait`](Self::wait) returned.
    pub fn start_round(&self) {
        let mut round = self.shared.round.lock();
        debug_assert_eq!(round.pending, 0, "start_round called mid-round");
        round.stats = RoundStats::new();
        round.errors.clear();
    }

    /// Queue a job for this round.
    pub fn enqueue(&self, job: Job) {
        {
            let mut round = self.shared.round.lock();
            round.pending += 1;
            round.stats.num_jobs += 1;
        }

        // Workers hold the receiving end for as long as any handle exists,
        // and this handle exists, so the send cannot fail.
        if let Err(err) = self.job_tx.send(job) {
            let mut round = self.shared.round.lock();
            round.pending -= 1;
            crate::error!("pool"; "dropped job '{}': workers are gone", err.0.name());
        }
    }

    /// Block until every job of the round has finished. Returns the failures.
    pub fn wait(&self) -> Vec<JobError> {
        let started = Instant::now();
        let mut round = self.shared.round.lock();
        while round.pending > 0 {
            self.shared.drained.wait(&mut round);
        }
        round.stats.loop_duration = started.elapsed();
        std::mem::take(&mut round.errors)
    }

    /// Snapshot of the current round's statistics.
    pub fn stats(&self) -> RoundStats {
        self.shared.round.lock().stats.clone()
    }
}

// =============================================================================
// Worker
// =============================================================================

fn run_worker(job_rx: &Receiver<Job>, shared: &Shared) {
    while let Ok(job) = job_rx.recv() {
        let (name, f) = job.into_parts();

        let start = Instant::now();
        // Catch panics so the round always drains
        let outcome = catch_unwind(AssertUnwindSafe(f))
            .unwrap_or_else(|_| Err(anyhow::anyhow!("job panicked")));
        let duration = start.elapsed();

        crate::debug!("pool"; "finished '{}' in {:.2?}", name, duration);

        let mut round = shared.round.lock();
        match outcome {
            Ok(false) => {}
            Ok(true) => {
                round.stats.num_jobs_executed += 1;
                round.stats.jobs_executed.push(JobRecord { name, duration });
            }
            Err(error) => {
                round.stats.num_jobs_executed += 1;
                round.stats.num_jobs_errored += 1;
                round.stats.jobs_executed.push(JobRecord {
                    name: name.clone(),
                    duration,
                });
                round.errors.push(JobError {
                    name,
                    duration,
                    error,
                });
            }
        }

        round.pending -= 1;
        if round.pending == 0 {
            shared.drained.notify_all();
        }
    }
}
