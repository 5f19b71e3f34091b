//! dawproject CLI
//!
//! Command-line interface for validating, inspecting and round-tripping
//! DAWProject XML files.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{commands, Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("dawproject v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => match handle_command(cmd) {
            Ok(code) => code,
            Err(err) => {
                error!("{:#}", err);
                ExitCode::FAILURE
            }
        },
        None => {
            println!("dawproject v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            ExitCode::SUCCESS
        }
    }
}

fn handle_command(cmd: Commands) -> anyhow::Result<ExitCode> {
    match cmd {
        Commands::Validate { paths } => {
            let failures = commands::validate(&paths)?;
            Ok(if failures == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Inspect { path, json } => commands::inspect(&path, json).map(|_| ExitCode::SUCCESS),
        Commands::Roundtrip { path } => commands::roundtrip(&path).map(|_| ExitCode::SUCCESS),
        Commands::Demo { output } => commands::demo(&output).map(|_| ExitCode::SUCCESS),
    }
}
