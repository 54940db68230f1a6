//! Hot-reload supervisor.
//!
//! `SIGUSR2` asks a running `build_loop` to replace itself with a fresh copy
//! of the (presumably rebuilt) executable. Before the exec the build loop is
//! told to finish, the watch handle is closed, and the HTTP server is given a
//! bounded grace period to drain.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crossbeam::channel::{Receiver, Sender};
use thiserror::Error;

use crate::serve::{ServeError, ServerSlot};
use crate::watch::WatchHandle;
use crate::{debug, error, log};

/// How long in-flight HTTP requests get before the exec.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to install SIGUSR2 handler")]
    Signal(#[source] io::Error),

    #[error("failed to shut down HTTP server")]
    Serve(#[from] ServeError),

    #[error("failed to locate current executable")]
    CurrentExe(#[source] io::Error),

    #[error("failed to re-execute {}", path.display())]
    Exec {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Forward every `SIGUSR2` delivery onto the returned channel.
///
/// The handler is installed before this returns, so a signal sent right
/// afterwards no longer terminates the process.
#[cfg(unix)]
pub fn listen_for_reload_signal() -> Result<Receiver<()>, SupervisorError> {
    use crossbeam::channel::{self, TrySendError};
    use tokio::signal::unix::{SignalKind, signal};

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(SupervisorError::Signal)?;

    let mut usr2 = {
        let _guard = runtime.enter();
        signal(SignalKind::user_defined2()).map_err(SupervisorError::Signal)?
    };

    let (tx, rx) = channel::bounded(1);
    std::thread::spawn(move || {
        runtime.block_on(async move {
            while usr2.recv().await.is_some() {
                debug!("reload"; "received SIGUSR2");
                // A reload already pending covers this one
                if let Err(TrySendError::Disconnected(())) = tx.try_send(()) {
                    break;
                }
            }
        });
    });

    Ok(rx)
}

/// There is no reload signal off unix; the channel never fires.
#[cfg(not(unix))]
pub fn listen_for_reload_signal() -> Result<Receiver<()>, SupervisorError> {
    Ok(crossbeam::channel::never())
}

/// Shut everything down and replace the process. Never returns; any failure
/// is logged and ends the process with status 1.
pub fn shutdown_and_exec(finish: &Sender<()>, watch: &WatchHandle, server: &ServerSlot) -> ! {
    log!("reload"; "restarting");

    let err = match prepare_exec(finish, watch, server, SHUTDOWN_GRACE) {
        Ok(exe) => replace_process(&exe, std::env::args_os().collect()),
        Err(e) => e,
    };
    fatal(err)
}

/// Everything that has to happen before the exec. Returns the path of the
/// running executable.
pub fn prepare_exec(
    finish: &Sender<()>,
    watch: &WatchHandle,
    server: &ServerSlot,
    grace: Duration,
) -> Result<PathBuf, SupervisorError> {
    // Full means a finish is already pending
    let _ = finish.try_send(());

    // Exec skips destructors, so the watch handle must be closed here
    watch.close();

    server.shutdown(grace)?;

    std::env::current_exe().map_err(SupervisorError::CurrentExe)
}

/// Replace the running process image with `exe`, keeping `args` (including
/// `argv[0]`) and the environment. Only returns on failure.
#[cfg(unix)]
fn replace_process(exe: &Path, args: Vec<OsString>) -> SupervisorError {
    use std::os::unix::process::CommandExt;
    use std::process::Command;

    let mut args = args.into_iter();
    let mut command = Command::new(exe);
    if let Some(arg0) = args.next() {
        command.arg0(arg0);
    }

    let source = command.args(args).exec();
    SupervisorError::Exec {
        path: exe.to_path_buf(),
        source,
    }
}

/// Without exec, run the new executable as a child and exit with its status.
#[cfg(not(unix))]
fn replace_process(exe: &Path, args: Vec<OsString>) -> SupervisorError {
    use std::process::Command;

    match Command::new(exe).args(args.into_iter().skip(1)).status() {
        Ok(status) => std::process::exit(status.code().unwrap_or(1)),
        Err(source) => SupervisorError::Exec {
            path: exe.to_path_buf(),
            source,
        },
    }
}

fn fatal(err: SupervisorError) -> ! {
    error!("reload"; "{:#}", anyhow::Error::from(err));
    std::process::exit(1)
}
