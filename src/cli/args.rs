//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

/// kiln incremental build orchestrator
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: kiln.toml)
    #[arg(short = 'C', long, default_value = "kiln.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a single build round
    #[command(visible_alias = "b")]
    Build {
        #[command(flatten)]
        build_args: BuildArgs,
    },

    /// Rebuild on change, serve the output, and re-exec on SIGUSR2
    #[command(visible_alias = "s")]
    Serve {
        #[command(flatten)]
        build_args: BuildArgs,

        /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
        #[arg(short, long)]
        interface: Option<IpAddr>,

        /// Port number to listen on (0 disables the HTTP server)
        #[arg(short, long)]
        port: Option<u16>,

        /// Reload browser pages after each round
        #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
        websocket: Option<bool>,
    },
}

impl Commands {
    pub fn build_args(&self) -> &BuildArgs {
        match self {
            Self::Build { build_args } | Self::Serve { build_args, .. } => build_args,
        }
    }
}

/// Arguments shared by `build` and `serve`
#[derive(clap::Args, Debug, Clone)]
pub struct BuildArgs {
    /// Source directory path
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub source: Option<PathBuf>,

    /// Target directory path
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub target: Option<PathBuf>,

    /// Maximum number of jobs running at once
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_serve_overrides() {
        let cli = Cli::parse_from(["kiln", "serve", "-p", "5277", "--websocket", "-j", "8"]);
        let Commands::Serve {
            build_args,
            port,
            websocket,
            interface,
        } = cli.command
        else {
            panic!("expected serve");
        };

        assert_eq!(port, Some(5277));
        assert_eq!(websocket, Some(true));
        assert_eq!(interface, None);
        assert_eq!(build_args.concurrency, Some(8));
        assert_eq!(cli.config, PathBuf::from("kiln.toml"));
    }

    #[test]
    fn test_build_defaults() {
        let cli = Cli::parse_from(["kiln", "-C", "site.toml", "build", "--verbose"]);
        assert_eq!(cli.config, PathBuf::from("site.toml"));
        assert!(cli.command.build_args().verbose);
        assert!(cli.command.build_args().source.is_none());
    }
}
