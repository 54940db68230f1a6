//! kiln: incremental build orchestration.
//!
//! A build function runs in rounds. Each round it plans work and queues jobs
//! on a worker pool; kiln drains the pool, reports errors and the slowest
//! jobs, and broadcasts that the round is complete. In loop mode, file
//! changes under the source directory trigger further rounds, a dev server
//! serves the target directory, and `SIGUSR2` re-executes the process.
//!
//! ```no_run
//! use kiln::{Config, Context, Job};
//!
//! let clean = kiln::build(Config::default(), |ctx: &Context| {
//!     ctx.enqueue(Job::new("hello", || Ok(true)));
//!     Vec::new()
//! })?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod logger;

pub mod build;
pub mod config;
pub mod context;
pub mod pool;
pub mod serve;
pub mod signal;
pub mod supervisor;
pub mod watch;

pub use build::{BuildError, MAX_MESSAGES, run_build_loop};
pub use config::{Config, ConfigError};
pub use context::{ChangedPaths, Context};
pub use pool::{Job, JobError, Pool, RoundStats};
pub use serve::{ServeError, ServerSlot};
pub use signal::RoundSignal;
pub use watch::{ChangeOp, WatchEvent, WatchHandle, should_rebuild};

use std::path::Path;
use std::sync::Arc;
use std::thread;

use anyhow::{Context as _, Result, anyhow, bail};
use crossbeam::channel;

/// Run exactly one round. Returns whether it finished without errors.
pub fn build<F>(config: Config, build_fn: F) -> Result<bool>
where
    F: Fn(&Context) -> Vec<anyhow::Error>,
{
    let config = config.normalized();
    ensure_source_dir(&config.source_dir)?;

    let (finish_tx, finish_rx) = channel::bounded(1);
    finish_tx.send(())?;

    let mut ctx = Context::new(config);
    Ok(run_build_loop(
        &mut ctx,
        build_fn,
        &finish_rx,
        &RoundSignal::new(),
    ))
}

/// Watch the source directory and rebuild on every change.
///
/// Starts the dev server after the first round when `port` is set. Returns
/// only if the build loop ends; a `SIGUSR2` replaces the process instead.
pub fn build_loop<F>(config: Config, build_fn: F) -> Result<()>
where
    F: Fn(&Context) -> Vec<anyhow::Error> + Send + 'static,
{
    let mut config = config.normalized();
    ensure_source_dir(&config.source_dir)?;

    // Changed paths arrive canonicalized from the OS watcher
    config.source_dir = config
        .source_dir
        .canonicalize()
        .with_context(|| format!("cannot resolve {}", config.source_dir.display()))?;

    let (watch, events) = WatchHandle::new().context("error starting watcher")?;
    watch
        .watch(&config.source_dir)
        .with_context(|| format!("error watching {}", config.source_dir.display()))?;

    let reload_rx = supervisor::listen_for_reload_signal()?;

    let mut ctx = Context::with_watch(config, watch.clone(), events);
    let round_complete = Arc::new(RoundSignal::new());
    let server = ServerSlot::new();
    let (finish_tx, finish_rx) = channel::bounded(1);

    if ctx.config().serves_http() {
        serve::spawn_bootstrap(
            Arc::clone(ctx.config()),
            Arc::clone(&round_complete),
            server.clone(),
        );
    }

    let build_thread = {
        let round_complete = Arc::clone(&round_complete);
        thread::Builder::new()
            .name("kiln-build".into())
            .spawn(move || run_build_loop(&mut ctx, build_fn, &finish_rx, &round_complete))?
    };

    if reload_rx.recv().is_ok() {
        supervisor::shutdown_and_exec(&finish_tx, &watch, &server);
    }

    // No reload signal can arrive any more; run until the loop stops
    build_thread
        .join()
        .map_err(|_| anyhow!("build loop panicked"))?;
    Ok(())
}

fn ensure_source_dir(path: &Path) -> Result<()> {
    if !path.is_dir() {
        bail!("source directory {} does not exist", path.display());
    }
    Ok(())
}
