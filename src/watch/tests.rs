use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

use super::{ChangeOp, WatchEvent, WatchHandle, run_watcher};
use crate::context::ChangedPaths;

const TIMEOUT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(100);

/// Channels wired to a watcher running on its own thread.
struct Harness {
    events: Sender<WatchEvent>,
    rebuild: Receiver<ChangedPaths>,
    done: Sender<()>,
    watcher: JoinHandle<()>,
}

impl Harness {
    fn start() -> Self {
        let (events_tx, events_rx) = channel::unbounded();
        let (rebuild_tx, rebuild_rx) = channel::bounded(0);
        let (done_tx, done_rx) = channel::bounded(1);

        let watcher = thread::spawn(move || run_watcher(&events_rx, &rebuild_tx, &done_rx));

        Self {
            events: events_tx,
            rebuild: rebuild_rx,
            done: done_tx,
            watcher,
        }
    }

    fn write(&self, path: &str) {
        self.events
            .send(WatchEvent::change(path, ChangeOp::WRITE))
            .unwrap();
    }

    fn send(&self, path: &str, op: ChangeOp) {
        self.events.send(WatchEvent::change(path, op)).unwrap();
    }

    fn next_set(&self) -> ChangedPaths {
        self.rebuild.recv_timeout(TIMEOUT).expect("no rebuild dispatched")
    }

    fn assert_quiet(&self) {
        assert_eq!(
            self.rebuild.recv_timeout(QUIET).map(|_| ()),
            Err(RecvTimeoutError::Timeout)
        );
    }

    /// Wait until the watcher has pulled every queued raw event.
    fn drain_events(&self) {
        let deadline = Instant::now() + TIMEOUT;
        while !self.events.is_empty() {
            assert!(Instant::now() < deadline, "watcher stopped consuming events");
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn ack(&self) {
        self.done.send(()).unwrap();
    }

    fn stop(self) {
        drop(self.events);
        self.watcher.join().unwrap();
    }
}

fn set(paths: &[&str]) -> ChangedPaths {
    paths.iter().map(PathBuf::from).collect()
}

#[test]
fn test_noise_filtered_from_dispatched_set() {
    let harness = Harness::start();

    harness.write("/src/.DS_Store");
    harness.write("/src/a.txt");

    assert_eq!(harness.next_set(), set(&["/src/a.txt"]));
    harness.stop();
}

#[test]
fn test_rejected_events_alone_never_dispatch() {
    let harness = Harness::start();

    harness.write("/src/4913");
    harness.write("/src/notes.md~");
    harness.send("/src/a.txt", ChangeOp::CHMOD);
    harness.send("/src/b.txt", ChangeOp::RENAME);

    harness.assert_quiet();
    harness.stop();
}

#[test]
fn test_changes_during_round_coalesce_into_next_set() {
    let harness = Harness::start();

    harness.write("/src/a.txt");
    assert_eq!(harness.next_set(), set(&["/src/a.txt"]));

    // Round in flight: a burst arrives, including a duplicate
    harness.write("/src/b.txt");
    harness.write("/src/c.txt");
    harness.send("/src/b.txt", ChangeOp::CREATE);
    harness.write("/src/.DS_Store");
    harness.drain_events();

    // Nothing more is dispatched until the round is acknowledged
    harness.assert_quiet();

    harness.ack();
    assert_eq!(harness.next_set(), set(&["/src/b.txt", "/src/c.txt"]));

    harness.ack();
    harness.assert_quiet();
    harness.stop();
}

#[test]
fn test_ack_without_new_changes_returns_to_idle() {
    let harness = Harness::start();

    harness.write("/src/a.txt");
    assert_eq!(harness.next_set(), set(&["/src/a.txt"]));

    harness.ack();
    harness.assert_quiet();

    // Back in idle, a fresh change starts a new cycle
    harness.write("/src/a.txt");
    assert_eq!(harness.next_set(), set(&["/src/a.txt"]));
    harness.stop();
}

#[test]
fn test_rejected_events_while_waiting_are_ignored() {
    let harness = Harness::start();

    harness.write("/src/a.txt");
    harness.next_set();

    harness.write("/src/.DS_Store");
    harness.send("/src/a.txt", ChangeOp::CHMOD);
    harness.drain_events();

    harness.ack();
    harness.assert_quiet();
    harness.stop();
}

#[test]
fn test_backend_errors_do_not_stop_the_watcher() {
    let harness = Harness::start();

    harness
        .events
        .send(WatchEvent::Error("inotify queue overflow".into()))
        .unwrap();
    harness.write("/src/a.txt");

    assert_eq!(harness.next_set(), set(&["/src/a.txt"]));
    harness.stop();
}

#[test]
fn test_watcher_stops_when_build_loop_is_gone() {
    let harness = Harness::start();
    drop(harness.rebuild);

    harness.events.send(WatchEvent::change("/src/a.txt", ChangeOp::WRITE)).unwrap();

    // The pending send fails instead of blocking forever
    harness.watcher.join().unwrap();
}

#[test]
fn test_watcher_stops_when_stream_closes_mid_round() {
    let harness = Harness::start();

    harness.write("/src/a.txt");
    harness.next_set();

    // Watcher is waiting for the acknowledgment; closing the stream ends it
    harness.stop();
}

#[test]
fn test_watch_handle_close_is_idempotent() {
    let (handle, events) = WatchHandle::new().unwrap();
    let dir = tempfile::TempDir::new().unwrap();

    handle.watch(dir.path()).unwrap();
    assert!(!handle.is_closed());

    let clone = handle.clone();
    clone.close();
    assert!(handle.is_closed());
    handle.close();

    // Watching after close is a no-op rather than an error
    handle.watch(dir.path()).unwrap();

    // The stream ends once the OS watcher is gone
    let deadline = Instant::now() + TIMEOUT;
    loop {
        match events.recv_timeout(Duration::from_millis(50)) {
            Err(RecvTimeoutError::Disconnected) => break,
            _ => assert!(Instant::now() < deadline, "event stream never closed"),
        }
    }
}
