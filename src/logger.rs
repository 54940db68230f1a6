//! Leveled logging with colored module prefixes.
//!
//! This module provides:
//! - `log!` macro for informational output
//! - `debug!` macro, shown only at [`Level::Debug`]
//! - `error!` macro, written to stderr and never filtered
//!
//! # Example
//!
//! ```ignore
//! log!("build"; "built site in {:?}", elapsed);
//! debug!("watch"; "received event: {}", path.display());
//! error!("watch"; "error from watcher: {}", err);
//! ```

use crossterm::{
    execute,
    terminal::{Clear, ClearType},
};
use owo_colors::OwoColorize;
use std::{
    io::{Write, stderr, stdout},
    sync::atomic::{AtomicU8, Ordering},
};

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Debug = 0,
    Info = 1,
    Error = 2,
}

impl Level {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Debug,
            1 => Self::Info,
            _ => Self::Error,
        }
    }
}

/// Process-wide minimum level, configured once at startup.
static LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);

/// Set the minimum level globally
pub fn set_level(level: Level) {
    LEVEL.store(level as u8, Ordering::SeqCst);
}

/// Current minimum level
pub fn level() -> Level {
    Level::from_u8(LEVEL.load(Ordering::SeqCst))
}

/// Whether a line at `level` would be printed
#[inline]
pub fn enabled(level: Level) -> bool {
    level >= self::level()
}

/// Set verbose mode globally (set by --verbose CLI argument)
pub fn set_verbose(v: bool) {
    set_level(if v { Level::Debug } else { Level::Info });
}

/// Check if verbose mode is enabled
pub fn is_verbose() -> bool {
    enabled(Level::Debug)
}

// ============================================================================
// Log Macros
// ============================================================================

/// Log a message with a colored module prefix
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::enabled($crate::logger::Level::Info) {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

/// Log a debug message (only shown when --verbose is enabled)
///
/// # Usage
/// ```ignore
/// debug!("module"; "debug info: {}", value);
/// ```
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

/// Log an error message to stderr
///
/// # Usage
/// ```ignore
/// error!("module"; "failed: {}", err);
/// ```
#[macro_export]
macro_rules! error {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log_error($module, &format!($($arg)*))
    }};
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Log a message with a colored module prefix
#[inline]
pub fn log(module: &str, message: &str) {
    let prefix = colorize_prefix(module, &module.to_ascii_lowercase());

    let mut stdout = stdout().lock();
    execute!(stdout, Clear(ClearType::UntilNewLine)).ok();
    writeln!(stdout, "{prefix} {message}").ok();
    stdout.flush().ok();
}

/// Log an error with a red module prefix
#[inline]
pub fn log_error(module: &str, message: &str) {
    let prefix = format!("[{module}]").bright_red().bold().to_string();

    let mut stderr = stderr().lock();
    writeln!(stderr, "{prefix} {message}").ok();
    stderr.flush().ok();
}

/// Apply color to a module prefix based on module type
#[inline]
fn colorize_prefix(module: &str, module_lower: &str) -> String {
    let prefix = format!("[{module}]");
    match module_lower {
        "serve" => prefix.bright_blue().bold().to_string(),
        "watch" => prefix.bright_green().bold().to_string(),
        "reload" => prefix.bright_magenta().bold().to_string(),
        "error" => prefix.bright_red().bold().to_string(),
        _ => prefix.bright_yellow().bold().to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
