//! Development HTTP server.
//!
//! Serves the target directory once the first build round has completed.
//! Optionally injects a live reload script into HTML responses.

mod lifecycle;
mod mime;
mod path;
mod reload;
mod response;


pub use lifecycle::ServerSlot;
pub use reload::{ReloadMessage, ReloadServer};

use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Result;
use thiserror::Error;
use tiny_http::{Request, Server};

use crate::config::Config;
use crate::signal::RoundSignal;
use crate::{debug, error, log};

/// Worker threads serving requests concurrently.
const REQUEST_THREADS: usize = 4;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to bind HTTP server on {addr}: {message}")]
    Bind { addr: SocketAddr, message: String },

    #[error("failed to bind WebSocket server on port {base_port} after {attempts} attempts")]
    WsBind {
        base_port: u16,
        attempts: u16,
        #[source]
        source: io::Error,
    },

    #[error("failed to create request pool")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("HTTP server did not shut down within {0:?}")]
    ShutdownTimeout(Duration),

    #[error("HTTP request loop panicked")]
    RequestLoopPanicked,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Start the dev server once the first round has completed.
///
/// A server that fails to start ends the process.
pub fn spawn_bootstrap(
    config: Arc<Config>,
    round_complete: Arc<RoundSignal>,
    slot: ServerSlot,
) -> JoinHandle<()> {
    thread::spawn(move || {
        debug!("serve"; "waiting for first build round");
        round_complete.wait_past(0);

        if let Err(e) = start(&config, &round_complete, &slot) {
            error!("serve"; "{:#}", anyhow::Error::from(e));
            std::process::exit(1);
        }
    })
}

/// Bind the HTTP server (and the live reload server, if enabled) and start
/// serving the target directory. The running server is stored in `slot`.
pub fn start(
    config: &Config,
    round_complete: &Arc<RoundSignal>,
    slot: &ServerSlot,
) -> Result<SocketAddr, ServeError> {
    let ws_port = if config.websocket {
        let reload = ReloadServer::start(
            config.interface,
            config.websocket_port,
            Arc::clone(round_complete),
        )?;
        Some(reload.port())
    } else {
        None
    };

    let addr = SocketAddr::new(config.interface, config.port);
    let server = Server::http(addr).map_err(|e| ServeError::Bind {
        addr,
        message: e.to_string(),
    })?;
    let addr = server.server_addr().to_ip().unwrap_or(addr);
    let server = Arc::new(server);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(REQUEST_THREADS)
        .thread_name(|i| format!("kiln-http-{i}"))
        .build()?;

    let request_loop = {
        let server = Arc::clone(&server);
        let target_dir = config.target_dir.clone();
        thread::spawn(move || run_request_loop(&server, &pool, &target_dir, ws_port))
    };
    slot.install(server, request_loop);

    log!("serve"; "http://{}", addr);
    Ok(addr)
}

/// Serve requests until the server is unblocked, then let in-flight
/// requests finish.
fn run_request_loop(
    server: &Server,
    pool: &rayon::ThreadPool,
    target_dir: &Path,
    ws_port: Option<u16>,
) {
    pool.in_place_scope(|scope| {
        for request in server.incoming_requests() {
            scope.spawn(move |_| {
                if let Err(e) = handle_request(request, target_dir, ws_port) {
                    log!("serve"; "request error: {e:#}");
                }
            });
        }
    });
    debug!("serve"; "request loop stopped");
}

fn handle_request(request: Request, target_dir: &Path, ws_port: Option<u16>) -> Result<()> {
    if !response::is_read_request(&request) {
        return response::respond_method_not_allowed(request);
    }

    if let Some(path) = path::resolve_path(request.url(), target_dir) {
        return response::respond_file(request, &path, ws_port);
    }

    response::respond_not_found(request, target_dir, ws_port)
}
