//! Shared build context.
//!
//! Long-lived state spanning all rounds: configuration, the worker pool, the
//! optional watch handle, and the transient [`RoundState`]. The build loop is
//! the only holder of `&mut Context`; the build function sees `&Context`, so
//! round state has a single writer by construction.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam::channel::Receiver;
use rustc_hash::FxHashSet;

use crate::config::Config;
use crate::pool::{Job, Pool, RoundStats};
use crate::watch::{WatchEvent, WatchHandle};

/// Absolute paths reported changed by the watcher for one round.
pub type ChangedPaths = FxHashSet<PathBuf>;

/// Per-round state, reset at the start of every round.
#[derive(Debug)]
pub struct RoundState {
    /// Paths changed since the last round; `None` means a full build.
    quick_paths: Option<ChangedPaths>,
    /// Set until the first round has completed.
    first_run: bool,
}

impl Default for RoundState {
    fn default() -> Self {
        Self {
            quick_paths: None,
            first_run: true,
        }
    }
}

pub struct Context {
    config: Arc<Config>,
    pool: Pool,
    watch: Option<WatchHandle>,
    /// Raw event stream, taken by the build loop when it spawns the watcher.
    events: Option<Receiver<WatchEvent>>,
    round: RoundState,
}

impl Context {
    /// Context for a one-shot build (no watching).
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config.normalized());
        let pool = Pool::new(config.concurrency);
        Self {
            config,
            pool,
            watch: None,
            events: None,
            round: RoundState::default(),
        }
    }

    /// Context whose rounds are driven by filesystem changes.
    pub fn with_watch(config: Config, watch: WatchHandle, events: Receiver<WatchEvent>) -> Self {
        Self {
            watch: Some(watch),
            events: Some(events),
            ..Self::new(config)
        }
    }

    /// Attach a raw event stream without an OS watcher (used to drive rounds
    /// from a synthetic source).
    pub fn with_events(mut self, events: Receiver<WatchEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn source_dir(&self) -> &Path {
        &self.config.source_dir
    }

    pub fn target_dir(&self) -> &Path {
        &self.config.target_dir
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Queue a job for the current round.
    pub fn enqueue(&self, job: Job) {
        self.pool.enqueue(job);
    }

    /// Changed paths for this round, or `None` when the round is a full build.
    pub fn quick_paths(&self) -> Option<&ChangedPaths> {
        self.round.quick_paths.as_ref()
    }

    /// Whether `path` needs attention this round.
    ///
    /// Always true on a full build; otherwise true only for reported changes.
    pub fn changed(&self, path: &Path) -> bool {
        self.round
            .quick_paths
            .as_ref()
            .is_none_or(|paths| paths.contains(path))
    }

    pub fn is_first_run(&self) -> bool {
        self.round.first_run
    }

    /// Add a path to the watch set. A no-op for one-shot builds.
    pub fn watch_path(&self, path: &Path) -> notify::Result<()> {
        match &self.watch {
            Some(watch) => watch.watch(path),
            None => Ok(()),
        }
    }

    /// Statistics for the current round.
    pub fn stats(&self) -> RoundStats {
        self.pool.stats()
    }

    // =========================================================================
    // Build loop only
    // =========================================================================

    pub(crate) fn take_events(&mut self) -> Option<Receiver<WatchEvent>> {
        self.events.take()
    }

    /// Begin a round, installing the changed paths handed off by the watcher.
    pub(crate) fn reset_round(&mut self, quick_paths: Option<ChangedPaths>) {
        self.round.quick_paths = quick_paths;
        self.pool.start_round();
    }

    /// End a round: quick paths never leak into the next one.
    pub(crate) fn finish_round(&mut self) {
        self.round.quick_paths = None;
    }

    /// Clear the first-run flag, returning whether it was set.
    pub(crate) fn take_first_run(&mut self) -> bool {
        std::mem::replace(&mut self.round.first_run, false)
    }
}
