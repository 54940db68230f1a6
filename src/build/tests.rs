use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Sender};
use parking_lot::Mutex;

use super::run_build_loop;
use crate::config::Config;
use crate::context::{ChangedPaths, Context};
use crate::pool::Job;
use crate::signal::RoundSignal;
use crate::watch::{ChangeOp, WatchEvent};

const TIMEOUT: Duration = Duration::from_secs(5);

fn config() -> Config {
    Config {
        concurrency: 4,
        ..Config::default()
    }
}

fn finished() -> channel::Receiver<()> {
    let (tx, rx) = channel::bounded(1);
    tx.send(()).unwrap();
    rx
}

#[test]
fn test_finish_before_change_runs_one_clean_round() {
    let rounds = AtomicUsize::new(0);
    let mut ctx = Context::new(config());
    let signal = RoundSignal::new();

    let clean = run_build_loop(
        &mut ctx,
        |_ctx| {
            rounds.fetch_add(1, Ordering::SeqCst);
            Vec::new()
        },
        &finished(),
        &signal,
    );

    assert!(clean);
    assert_eq!(rounds.load(Ordering::SeqCst), 1);
    assert_eq!(signal.generation(), 1);
}

#[test]
fn test_planning_error_makes_round_unclean() {
    let mut ctx = Context::new(config());

    let clean = run_build_loop(
        &mut ctx,
        |_ctx| vec![anyhow::anyhow!("malformed front matter")],
        &finished(),
        &RoundSignal::new(),
    );

    assert!(!clean);
}

#[test]
fn test_job_failure_is_collected() {
    let mut ctx = Context::new(config());

    let clean = run_build_loop(
        &mut ctx,
        |ctx| {
            for i in 0..4 {
                ctx.enqueue(Job::new(format!("ok-{i}"), || Ok(true)));
            }
            ctx.enqueue(Job::new("broken", || anyhow::bail!("nope")));
            Vec::new()
        },
        &finished(),
        &RoundSignal::new(),
    );

    assert!(!clean);
    let stats = ctx.stats();
    assert_eq!(stats.num_jobs, 5);
    assert_eq!(stats.num_jobs_executed, 5);
    assert_eq!(stats.num_jobs_errored, 1);
}

#[test]
fn test_first_round_sees_full_build() {
    let seen = Mutex::new(Vec::new());
    let mut ctx = Context::new(config());

    run_build_loop(
        &mut ctx,
        |ctx| {
            seen.lock().push((ctx.is_first_run(), ctx.quick_paths().cloned()));
            Vec::new()
        },
        &finished(),
        &RoundSignal::new(),
    );

    assert_eq!(*seen.lock(), vec![(true, None)]);
    assert!(!ctx.is_first_run());
}

/// A build loop running on its own thread, fed by a synthetic event stream.
struct Looping {
    events: Sender<WatchEvent>,
    finish: Sender<()>,
    signal: Arc<RoundSignal>,
    seen: Arc<Mutex<Vec<Option<ChangedPaths>>>>,
    handle: thread::JoinHandle<bool>,
}

impl Looping {
    fn start(fail_on: Option<&'static str>) -> Self {
        let (events_tx, events_rx) = channel::unbounded();
        let (finish_tx, finish_rx) = channel::bounded(1);
        let signal = Arc::new(RoundSignal::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let handle = {
            let signal = Arc::clone(&signal);
            let seen = Arc::clone(&seen);
            thread::spawn(move || {
                let mut ctx = Context::new(config()).with_events(events_rx);
                run_build_loop(
                    &mut ctx,
                    |ctx| {
                        let quick = ctx.quick_paths().cloned();
                        let failed = fail_on.is_some_and(|name| {
                            quick
                                .as_ref()
                                .is_some_and(|q| q.contains(&PathBuf::from(name)))
                        });
                        seen.lock().push(quick);
                        if failed {
                            vec![anyhow::anyhow!("cannot build {:?}", fail_on)]
                        } else {
                            Vec::new()
                        }
                    },
                    &finish_rx,
                    &signal,
                )
            })
        };

        Self {
            events: events_tx,
            finish: finish_tx,
            signal,
            seen,
            handle,
        }
    }

    fn wait_round(&self, n: u64) {
        assert!(
            self.signal.wait_past_timeout(n - 1, TIMEOUT).is_some(),
            "round {n} never completed"
        );
    }

    fn write(&self, path: &str) {
        self.events
            .send(WatchEvent::change(path, ChangeOp::WRITE))
            .unwrap();
    }

    fn finish(self) -> (bool, Vec<Option<ChangedPaths>>) {
        self.finish.send(()).unwrap();
        let clean = self.handle.join().unwrap();
        let seen = self.seen.lock().clone();
        (clean, seen)
    }
}

fn set(paths: &[&str]) -> ChangedPaths {
    paths.iter().map(PathBuf::from).collect()
}

#[test]
fn test_quick_paths_visible_only_in_following_round() {
    let looping = Looping::start(None);

    looping.wait_round(1);
    looping.write("/src/a.txt");
    looping.wait_round(2);
    looping.write("/src/b.txt");
    looping.wait_round(3);

    let (clean, seen) = looping.finish();
    assert!(clean);
    assert_eq!(
        seen,
        vec![None, Some(set(&["/src/a.txt"])), Some(set(&["/src/b.txt"]))]
    );
}

#[test]
fn test_noise_does_not_trigger_rounds() {
    let looping = Looping::start(None);

    looping.wait_round(1);
    looping.write("/src/.DS_Store");
    looping.write("/src/a.txt~");
    looping.write("/src/a.txt");
    looping.wait_round(2);

    // Give a spurious third round a chance to appear
    thread::sleep(Duration::from_millis(100));
    assert_eq!(looping.signal.generation(), 2);

    let (_, seen) = looping.finish();
    assert_eq!(seen, vec![None, Some(set(&["/src/a.txt"]))]);
}

#[test]
fn test_errors_do_not_stop_the_loop() {
    let looping = Looping::start(Some("/src/bad.txt"));

    looping.wait_round(1);
    looping.write("/src/bad.txt");
    looping.wait_round(2);
    looping.write("/src/good.txt");
    looping.wait_round(3);

    // Last round was clean even though an earlier one failed
    let (clean, seen) = looping.finish();
    assert!(clean);
    assert_eq!(seen.len(), 3);
}

#[test]
fn test_last_round_errors_are_reported_on_finish() {
    let looping = Looping::start(Some("/src/bad.txt"));

    looping.wait_round(1);
    looping.write("/src/bad.txt");
    looping.wait_round(2);

    let (clean, _) = looping.finish();
    assert!(!clean);
}

#[test]
fn test_burst_during_round_is_not_lost_or_duplicated() {
    let looping = Looping::start(None);
    looping.wait_round(1);

    // Every change lands in exactly one round, no set is repeated
    let paths: Vec<String> = (0..20).map(|i| format!("/src/file-{i}.txt")).collect();
    for path in &paths {
        looping.write(path);
    }

    // Wait until all twenty paths have been built
    let deadline = std::time::Instant::now() + TIMEOUT;
    loop {
        let built: usize = looping
            .seen
            .lock()
            .iter()
            .flatten()
            .map(|set| set.len())
            .sum();
        if built >= paths.len() {
            break;
        }
        assert!(std::time::Instant::now() < deadline, "changes were lost");
        thread::sleep(Duration::from_millis(5));
    }

    let (_, seen) = looping.finish();
    let sets: Vec<ChangedPaths> = seen.into_iter().flatten().collect();

    let mut union = ChangedPaths::default();
    for set in &sets {
        for path in set {
            assert!(union.insert(path.clone()), "{} built twice", path.display());
        }
    }
    assert_eq!(union.len(), paths.len());
    assert!(sets.len() <= paths.len());
}

#[test]
fn test_pending_finish_wins_over_waiting_change() {
    let (events_tx, events_rx) = channel::unbounded();
    events_tx
        .send(WatchEvent::change("/src/a.txt", ChangeOp::WRITE))
        .unwrap();

    let rounds = AtomicUsize::new(0);
    let signal = RoundSignal::new();
    let mut ctx = Context::new(config()).with_events(events_rx);

    // The watcher hands the change over while the first round is still
    // running, so it is blocked on the rebuild channel when the round ends
    let clean = run_build_loop(
        &mut ctx,
        |_ctx| {
            rounds.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(200));
            Vec::new()
        },
        &finished(),
        &signal,
    );

    assert!(clean);
    assert_eq!(rounds.load(Ordering::SeqCst), 1);
    assert_eq!(signal.generation(), 1);
}
