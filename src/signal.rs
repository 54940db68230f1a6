//! Round-complete broadcast.
//!
//! A generation counter guarded by a mutex, plus a condition variable. Every
//! completed round bumps the generation and wakes all waiters. Waiters never
//! register: anyone holding a reference can wait for the next round, or for
//! the generation to move past a value they observed earlier.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Broadcast signal fired after every build round.
#[derive(Debug, Default)]
pub struct RoundSignal {
    generation: Mutex<u64>,
    cond: Condvar,
}

impl RoundSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rounds completed so far.
    pub fn generation(&self) -> u64 {
        *self.generation.lock()
    }

    /// Mark a round complete and wake every waiter.
    pub fn notify(&self) {
        let mut generation = self.generation.lock();
        *generation += 1;
        self.cond.notify_all();
    }

    /// Block until the next round completes. Returns the new generation.
    pub fn wait_next(&self) -> u64 {
        let seen = self.generation();
        self.wait_past(seen)
    }

    /// Block until the generation is greater than `seen`.
    ///
    /// Returns immediately when it already is, so a waiter that arrives late
    /// does not miss a round that finished before it started waiting.
    pub fn wait_past(&self, seen: u64) -> u64 {
        let mut generation = self.generation.lock();
        while *generation <= seen {
            self.cond.wait(&mut generation);
        }
        *generation
    }

    /// Like [`wait_past`](Self::wait_past), giving up after `timeout`.
    pub fn wait_past_timeout(&self, seen: u64, timeout: Duration) -> Option<u64> {
        let deadline = Instant::now() + timeout;
        let mut generation = self.generation.lock();
        while *generation <= seen {
            if self.cond.wait_until(&mut generation, deadline).timed_out() {
                return (*generation > seen).then_some(*generation);
            }
        }
        Some(*generation)
    }
}
