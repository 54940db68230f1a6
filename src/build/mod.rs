//! Round-based build driver.
//!
//! Each round resets round state, runs the build function, drains the pool,
//! reports, and broadcasts completion. Rounds repeat for every change set the
//! watcher hands over, until a finish signal arrives.

mod report;

#[cfg(test)]
mod tests;

pub use report::MAX_MESSAGES;

use std::thread;

use crossbeam::channel::{self, Receiver, select};
use thiserror::Error;

use crate::context::{ChangedPaths, Context};
use crate::pool::JobError;
use crate::signal::RoundSignal;
use crate::watch::run_watcher;
use crate::{debug, log};

/// An error collected during a round.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Returned by the build function while planning jobs.
    #[error("{0:#}")]
    Planning(anyhow::Error),

    /// A queued job failed.
    #[error(transparent)]
    Job(#[from] JobError),
}

/// Run rounds until `finish` fires. Returns whether the last round was clean.
///
/// When the context carries a raw event stream, a watcher thread is started
/// and each change set it dispatches triggers a new round with those paths
/// as quick paths. Build errors never stop the loop.
pub fn run_build_loop<F>(
    ctx: &mut Context,
    build_fn: F,
    finish: &Receiver<()>,
    round_complete: &RoundSignal,
) -> bool
where
    F: Fn(&Context) -> Vec<anyhow::Error>,
{
    let (rebuild_tx, rebuild_rx) = channel::bounded::<ChangedPaths>(0);
    let (done_tx, done_rx) = channel::bounded::<()>(1);

    match ctx.take_events() {
        Some(events) => {
            thread::spawn(move || run_watcher(&events, &rebuild_tx, &done_rx));
        }
        // Without a watcher the rebuild channel is disconnected and the loop
        // below only waits for finish
        None => drop((rebuild_tx, done_rx)),
    }

    let mut changed: Option<ChangedPaths> = None;

    loop {
        debug!("build"; "start loop");
        ctx.reset_round(changed.take());

        let mut errors: Vec<BuildError> = build_fn(&*ctx)
            .into_iter()
            .map(BuildError::Planning)
            .collect();
        errors.extend(ctx.pool().wait().into_iter().map(BuildError::Job));

        let stats = ctx.stats();
        report::log_round(&errors, &stats, stats.start.elapsed());

        ctx.finish_round();
        round_complete.notify();

        // The watcher only waits for an acknowledgment after dispatching, and
        // the first round was not triggered by a dispatch
        if !ctx.take_first_run() {
            let _ = done_tx.send(());
        }

        // A pending finish wins over a change set already waiting on the
        // rendezvous, so no round starts after a shutdown was requested
        if finish.try_recv().is_ok() {
            log!("build"; "detected finish signal; stopping");
            return errors.is_empty();
        }

        select! {
            recv(finish) -> _ => {
                log!("build"; "detected finish signal; stopping");
                return errors.is_empty();
            }
            recv(rebuild_rx) -> paths => match paths {
                Ok(paths) => {
                    log!("build"; "detected change on {}; rebuilding", describe(&paths));
                    changed = Some(paths);
                }
                Err(_) => {
                    // Watcher gone (or never started)
                    let _ = finish.recv();
                    log!("build"; "detected finish signal; stopping");
                    return errors.is_empty();
                }
            },
        }
    }
}

/// Short human-readable list of changed paths.
fn describe(paths: &ChangedPaths) -> String {
    const SHOWN: usize = 3;

    let mut names: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    names.sort();

    if names.len() > SHOWN {
        let rest = names.len() - SHOWN;
        names.truncate(SHOWN);
        format!("{} (+{} more)", names.join(", "), rest)
    } else {
        names.join(", ")
    }
}
