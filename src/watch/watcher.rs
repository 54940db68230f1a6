//! Change watcher: filters raw events and coalesces them into rebuild requests.
//!
//! ```text
//! Idle ──accepted event──▶ Dispatching ──set received by build loop──▶ Waiting
//!  ▲                            ▲                                        │
//!  └──── done, nothing new ─────┴──────── done, new changes pending ─────┘
//! ```
//!
//! At most one change set is in flight: after dispatching, the watcher only
//! accumulates until the build loop acknowledges the round on `rebuild_done`.
//! Changes that arrive meanwhile are dispatched together as the next round.

use crossbeam::channel::{Receiver, Sender, TryRecvError, select};

use super::filter::should_rebuild;
use super::handle::WatchEvent;
use crate::context::ChangedPaths;

/// Run the watcher until the raw event stream closes or the build loop exits.
pub fn run_watcher(
    events: &Receiver<WatchEvent>,
    rebuild_tx: &Sender<ChangedPaths>,
    rebuild_done: &Receiver<()>,
) {
    while let Ok(event) = events.recv() {
        let mut pending = ChangedPaths::default();
        accept(event, &mut pending);

        while !pending.is_empty() {
            // Rendezvous with the build loop; blocks until it is ready
            if rebuild_tx.send(std::mem::take(&mut pending)).is_err() {
                crate::debug!("watch"; "build loop gone; stopping watcher");
                return;
            }

            if !accumulate_until_done(events, rebuild_done, &mut pending) {
                return;
            }
        }
    }

    crate::debug!("watch"; "event stream closed; stopping watcher");
}

/// Wait for the build loop to finish the round, collecting changes meanwhile.
///
/// Returns `false` when either channel closed and the watcher should stop.
fn accumulate_until_done(
    events: &Receiver<WatchEvent>,
    rebuild_done: &Receiver<()>,
    pending: &mut ChangedPaths,
) -> bool {
    loop {
        // The acknowledgment takes priority over new events
        match rebuild_done.try_recv() {
            Ok(()) => return true,
            Err(TryRecvError::Disconnected) => return false,
            Err(TryRecvError::Empty) => {}
        }

        select! {
            recv(rebuild_done) -> done => return done.is_ok(),
            recv(events) -> event => match event {
                Ok(event) => accept(event, pending),
                Err(_) => return false,
            },
        }
    }
}

/// Add the event's path to `pending` if it is build-relevant.
fn accept(event: WatchEvent, pending: &mut ChangedPaths) {
    match event {
        WatchEvent::Change { path, op } => {
            crate::debug!("watch"; "received event: {:?} {}", op, path.display());
            if should_rebuild(&path, op) {
                pending.insert(path);
            }
        }
        WatchEvent::Error(e) => crate::error!("watch"; "error from watcher: {}", e),
    }
}
