// crates/tollgate-cli/src/main.rs
// ============================================================================
// Module: Tollgate CLI Entry Point
// Description: Command dispatcher for the Tollgate API server.
// Purpose: Load configuration and run the billed data-access platform.
// Dependencies: clap, tollgate-api, tollgate-config, tokio
// ============================================================================

//! ## Overview
//! The Tollgate CLI starts the API server from a TOML configuration file.
//! Configuration resolution follows the platform rules: an explicit
//! `--config` path, then the `TOLLGATE_CONFIG` environment variable, then
//! `tollgate.toml` in the working directory. Failures are reported on
//! stderr with a non-zero exit code.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use tollgate_api::ApiServer;
use tollgate_config::TollgateConfig;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "tollgate", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Tollgate API server.
    Serve(ServeCommand),
}

/// Arguments for the `serve` subcommand.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Path to the TOML configuration file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.show_version {
        emit_line(&format!("tollgate {}", env!("CARGO_PKG_VERSION")));
        return ExitCode::SUCCESS;
    }
    match cli.command {
        Some(Commands::Serve(command)) => match run_serve(command).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(message) => {
                emit_error(&message);
                ExitCode::FAILURE
            }
        },
        None => {
            emit_error("no command given; try `tollgate serve --config tollgate.toml`");
            ExitCode::FAILURE
        }
    }
}

/// Loads configuration and serves the API.
async fn run_serve(command: ServeCommand) -> Result<(), String> {
    let config =
        TollgateConfig::load(command.config.as_deref()).map_err(|err| err.to_string())?;
    let server = ApiServer::from_config(config).map_err(|err| err.to_string())?;
    server.serve().await.map_err(|err| err.to_string())
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes an informational line to stdout.
#[allow(clippy::print_stdout, reason = "stdout is the CLI's user interface")]
fn emit_line(message: &str) {
    println!("{message}");
}

/// Writes an error line to stderr.
#[allow(clippy::print_stderr, reason = "stderr is the CLI's error channel")]
fn emit_error(message: &str) {
    eprintln!("error: {message}");
}
