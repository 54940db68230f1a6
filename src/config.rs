//! Configuration management for `kiln.toml`.
//!
//! # Example
//!
//! ```toml
//! source_dir = "content"      # Directory containing source files
//! target_dir = "public"       # Directory the build writes to
//! concurrency = 16            # Worker threads per round
//! port = 5277                 # Serve target_dir over HTTP (0 = disabled)
//! interface = "127.0.0.1"     # Network interface for the HTTP server
//! websocket = true            # Live reload over WebSocket
//! websocket_port = 35729      # Base port for the WebSocket server
//! ```

use std::{
    fs,
    net::{IpAddr, Ipv4Addr},
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Worker threads used when `concurrency` is unset or zero.
pub const DEFAULT_CONCURRENCY: usize = 50;

/// Default base port for the live reload WebSocket.
pub const DEFAULT_WS_PORT: u16 = 35729;

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config file parsing error")]
    Toml(#[from] toml::de::Error),
}

/// Root configuration structure representing kiln.toml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory containing source files.
    pub source_dir: PathBuf,

    /// Directory the build writes to, and the HTTP server serves from.
    pub target_dir: PathBuf,

    /// Number of concurrent workers during a round.
    pub concurrency: usize,

    /// Port on which to serve `target_dir` over HTTP.
    /// - `0` (default): no server
    pub port: u16,

    /// Network interface to bind.
    /// - `127.0.0.1` (default): localhost only
    /// - `0.0.0.0`: all interfaces (LAN accessible)
    pub interface: IpAddr,

    /// Development mode with a WebSocket that triggers live reload.
    pub websocket: bool,

    /// Base port for the live reload WebSocket (retries upward when taken).
    pub websocket_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("."),
            target_dir: PathBuf::from("./public"),
            concurrency: DEFAULT_CONCURRENCY,
            port: 0,
            interface: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            websocket: false,
            websocket_port: DEFAULT_WS_PORT,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        content.parse()
    }

    /// Fill in defaults for any property that was left empty.
    pub fn normalized(mut self) -> Self {
        if self.concurrency == 0 {
            self.concurrency = DEFAULT_CONCURRENCY;
        }
        if self.source_dir.as_os_str().is_empty() {
            self.source_dir = PathBuf::from(".");
        }
        if self.target_dir.as_os_str().is_empty() {
            self.target_dir = PathBuf::from("./public");
        }
        self
    }

    /// Whether the dev server should be started.
    pub fn serves_http(&self) -> bool {
        self.port != 0
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str::<Self>(s)?.normalized())
    }
}
