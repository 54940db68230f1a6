//! File watching
//!
//! Turns the OS change stream into rebuild requests for the build loop.
//!
//! Architecture:
//! ```text
//! notify → WatchEvent stream → filter (noise) → watcher (coalesce) → ChangedPaths
//! ```

// Pure build-relevance predicate.
mod filter;
// OS watcher ownership and the raw event stream.
mod handle;
// Coalescing state machine and rebuild handshake.
mod watcher;

#[cfg(test)]
mod tests;

pub use filter::{ChangeOp, should_rebuild};
pub use handle::{WatchEvent, WatchHandle};
pub use watcher::run_watcher;
