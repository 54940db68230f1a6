//! Server lifecycle management.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tiny_http::Server;

use super::ServeError;
use crate::log;

/// Poll interval while waiting for the request loop to drain.
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

struct RunningServer {
    server: Arc<Server>,
    request_loop: JoinHandle<()>,
}

/// Shared slot holding the running HTTP server, if any.
///
/// Filled by the dev server bootstrap once the first round completes, and
/// emptied by whoever shuts the server down.
#[derive(Clone, Default)]
pub struct ServerSlot {
    inner: Arc<Mutex<Option<RunningServer>>>,
}

impl ServerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn install(&self, server: Arc<Server>, request_loop: JoinHandle<()>) {
        *self.inner.lock() = Some(RunningServer {
            server,
            request_loop,
        });
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().is_some()
    }

    /// Stop accepting connections and wait up to `grace` for in-flight
    /// requests to finish. Succeeds trivially when no server is running.
    pub fn shutdown(&self, grace: Duration) -> Result<(), ServeError> {
        let Some(running) = self.inner.lock().take() else {
            return Ok(());
        };

        log!("serve"; "shutting down HTTP server");
        running.server.unblock();
        wait_for_shutdown(running.request_loop, grace)
    }
}

/// Wait for the request loop to return, with a hard cutoff.
fn wait_for_shutdown(handle: JoinHandle<()>, grace: Duration) -> Result<(), ServeError> {
    let deadline = Instant::now() + grace;

    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return Err(ServeError::ShutdownTimeout(grace));
        }
        thread::sleep(SHUTDOWN_POLL);
    }

    handle.join().map_err(|_| ServeError::RequestLoopPanicked)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_slot_shuts_down_trivially() {
        let slot = ServerSlot::new();
        assert!(!slot.is_running());
        assert!(slot.shutdown(Duration::from_millis(10)).is_ok());
    }

    #[test]
    fn test_wait_for_shutdown_times_out() {
        let handle = thread::spawn(|| thread::sleep(Duration::from_millis(500)));
        let err = wait_for_shutdown(handle, Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, ServeError::ShutdownTimeout(_)));
    }

    #[test]
    fn test_wait_for_shutdown_joins_finished_loop() {
        let handle = thread::spawn(|| {});
        assert!(wait_for_shutdown(handle, Duration::from_secs(1)).is_ok());
    }
}
