//! Command-line front end.

mod args;
pub mod mirror;

pub use args::{BuildArgs, Cli, Commands};

use anyhow::Result;
use kiln::Config;

/// Load `kiln.toml` (when present) and apply command-line overrides.
pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = if cli.config.is_file() {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };

    let args = cli.command.build_args();
    if let Some(source) = &args.source {
        config.source_dir = source.clone();
    }
    if let Some(target) = &args.target {
        config.target_dir = target.clone();
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }

    if let Commands::Serve {
        interface,
        port,
        websocket,
        ..
    } = &cli.command
    {
        if let Some(interface) = interface {
            config.interface = *interface;
        }
        if let Some(port) = port {
            config.port = *port;
        }
        if let Some(websocket) = websocket {
            config.websocket = *websocket;
        }
    }

    Ok(config.normalized())
}
