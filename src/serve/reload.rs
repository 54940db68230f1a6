//! Browser live reload over WebSocket.
//!
//! Every served HTML page gets a small script that connects back to this
//! server. After each completed build round, connected pages receive a
//! `reload` message.

use std::io;
use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tungstenite::WebSocket;
use tungstenite::protocol::Message;

use super::ServeError;
use crate::signal::RoundSignal;
use crate::{debug, log};

/// Maximum port retry attempts
const MAX_PORT_RETRIES: u16 = 10;

/// Longest a single send may block on a client that stopped reading.
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

const RELOAD_SCRIPT: &str = r#"<script>
(function(){
    var ws = new WebSocket("ws://" + location.hostname + ":__PORT__");
    ws.onmessage = function(e) {
        if (JSON.parse(e.data).type === "reload") location.reload();
    };
})();
</script>"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReloadMessage {
    Connected,
    Reload,
}

impl ReloadMessage {
    pub fn to_json(self) -> String {
        serde_json::to_string(&self).unwrap_or_else(|_| r#"{"type":"reload"}"#.to_string())
    }
}

type Clients = Arc<Mutex<Vec<WebSocket<TcpStream>>>>;

/// Running live reload server.
pub struct ReloadServer {
    port: u16,
    clients: Clients,
}

impl ReloadServer {
    /// Bind near `base_port`, then accept clients and broadcast a reload after
    /// every round that completes from now on.
    pub fn start(
        interface: IpAddr,
        base_port: u16,
        round_complete: Arc<RoundSignal>,
    ) -> Result<Self, ServeError> {
        let (listener, port) = try_bind_port(interface, base_port, MAX_PORT_RETRIES)?;
        let clients = Clients::default();
        let seen = round_complete.generation();

        {
            let clients = Arc::clone(&clients);
            thread::spawn(move || accept_loop(&listener, &clients));
        }
        {
            let clients = Arc::clone(&clients);
            thread::spawn(move || broadcast_loop(&round_complete, seen, &clients));
        }

        debug!("reload"; "ws://{}:{}", interface, port);
        Ok(Self { port, clients })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }
}

fn accept_loop(listener: &TcpListener, clients: &Clients) {
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                log!("reload"; "accept error: {}", e);
                continue;
            }
        };

        // Broadcasts send while holding the client list, so a stalled tab
        // must not be able to block it for long
        if let Err(e) = stream.set_write_timeout(Some(WRITE_TIMEOUT)) {
            log!("reload"; "cannot set write timeout: {}", e);
            continue;
        }

        match tungstenite::accept(stream) {
            Ok(mut ws) => {
                // Register before greeting so a greeted client never misses a reload
                let mut clients = clients.lock();
                if let Err(e) = ws.send(Message::Text(ReloadMessage::Connected.to_json().into())) {
                    log!("reload"; "failed to greet client: {}", e);
                    continue;
                }
                clients.push(ws);
                debug!("reload"; "client connected (total: {})", clients.len());
            }
            Err(e) => log!("reload"; "handshake failed: {}", e),
        }
    }
}

fn broadcast_loop(round_complete: &RoundSignal, mut seen: u64, clients: &Clients) {
    loop {
        seen = round_complete.wait_past(seen);

        let mut clients = clients.lock();
        let message = ReloadMessage::Reload.to_json();
        clients.retain_mut(|ws| ws.send(Message::Text(message.clone().into())).is_ok());
        debug!("reload"; "reload sent to {} client(s)", clients.len());
    }
}

/// Try binding to port, retry with incremented port if in use
fn try_bind_port(
    interface: IpAddr,
    base_port: u16,
    max_retries: u16,
) -> Result<(TcpListener, u16), ServeError> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind(SocketAddr::new(interface, port)) {
            Ok(listener) => {
                let actual_port = listener.local_addr()?.port();
                return Ok((listener, actual_port));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(ServeError::WsBind {
        base_port,
        attempts: max_retries,
        source: last_error.unwrap_or_else(|| io::Error::other("no attempts made")),
    })
}

/// Inject the reload script when serving HTML with live reload enabled.
pub fn maybe_inject_reload_script(body: Vec<u8>, content_type: &str, ws_port: Option<u16>) -> Vec<u8> {
    match (content_type.starts_with("text/html"), ws_port) {
        (true, Some(port)) => inject_reload_script(&body, port),
        _ => body,
    }
}

/// Insert the script before the last `</body>`, or append it.
fn inject_reload_script(content: &[u8], ws_port: u16) -> Vec<u8> {
    const PATTERN: &[u8] = b"</body>";

    let script = RELOAD_SCRIPT.replace("__PORT__", &ws_port.to_string());
    let script = script.as_bytes();

    let pos = content
        .windows(PATTERN.len())
        .rposition(|w| w.eq_ignore_ascii_case(PATTERN))
        .unwrap_or(content.len());

    let mut result = Vec::with_capacity(content.len() + script.len());
    result.extend_from_slice(&content[..pos]);
    result.extend_from_slice(script);
    result.extend_from_slice(&content[pos..]);
    result
}
