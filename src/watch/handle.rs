use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam::channel::{self, Receiver};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;

use super::filter::ChangeOp;

/// One item of the raw event stream: a change, or a backend error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Change { path: PathBuf, op: ChangeOp },
    Error(String),
}

impl WatchEvent {
    pub fn change(path: impl Into<PathBuf>, op: ChangeOp) -> Self {
        Self::Change {
            path: path.into(),
            op,
        }
    }
}

/// Owner of the OS watcher.
///
/// Clones share the same watcher: the build context adds watched paths
/// through one clone while the hot-reload supervisor closes it through
/// another. Closing drops the OS watcher, which ends the event stream.
#[derive(Clone)]
pub struct WatchHandle {
    watcher: Arc<Mutex<Option<RecommendedWatcher>>>,
}

impl WatchHandle {
    /// Start a watcher. Events and errors are fanned into one stream.
    pub fn new() -> notify::Result<(Self, Receiver<WatchEvent>)> {
        let (tx, rx) = channel::unbounded();

        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    let op = ChangeOp::from_kind(&event.kind);
                    for path in event.paths {
                        let _ = tx.send(WatchEvent::Change { path, op });
                    }
                }
                Err(e) => {
                    let _ = tx.send(WatchEvent::Error(e.to_string()));
                }
            }
        })?;

        let handle = Self {
            watcher: Arc::new(Mutex::new(Some(watcher))),
        };
        Ok((handle, rx))
    }

    /// Watch `path` recursively. A no-op once closed.
    pub fn watch(&self, path: &Path) -> notify::Result<()> {
        if let Some(watcher) = self.watcher.lock().as_mut() {
            watcher.watch(path, RecursiveMode::Recursive)?;
            crate::debug!("watch"; "watching {}", path.display());
        }
        Ok(())
    }

    /// Stop watching. Safe to call more than once.
    pub fn close(&self) {
        if self.watcher.lock().take().is_some() {
            crate::debug!("watch"; "watcher closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.watcher.lock().is_none()
    }
}
