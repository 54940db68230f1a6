//! kiln - incremental build orchestrator.

mod cli;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands, mirror::mirror};
use kiln::{error, logger};

fn main() {
    if let Err(e) = run() {
        error!("kiln"; "{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.command.build_args().verbose);

    let config = cli::load_config(&cli)?;

    match &cli.command {
        Commands::Build { .. } => {
            if !kiln::build(config, mirror)? {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Serve { .. } => kiln::build_loop(config, mirror),
    }
}
