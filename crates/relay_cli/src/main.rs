//! agent-relay CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments (unknown or empty pipeline)
//! - 3: Configuration error
//! - 4: Run failed (provider error or timeout)
//! - 5: Run stopped

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use relay_core::{CoreError, RunFailure};

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const CONFIG_ERROR: u8 = 3;
    pub const RUN_FAILED: u8 = 4;
    pub const RUN_STOPPED: u8 = 5;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so streamed output stays clean on stdout
    let level = if cli.global.verbose { "relay=debug" } else { "relay=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let result = match cli.command {
        Commands::Agents(args) => commands::agents::execute(args, &cli.global).await,
        Commands::Pipelines(args) => commands::pipelines::execute(args, &cli.global).await,
        Commands::Run(args) => commands::run::execute(args, &cli.global).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    if let Some(failure) = e.downcast_ref::<RunFailure>() {
        return if failure.is_cancelled() {
            ExitCodes::RUN_STOPPED
        } else {
            ExitCodes::RUN_FAILED
        };
    }

    match e.downcast_ref::<CoreError>() {
        Some(CoreError::PipelineNotFound(_) | CoreError::EmptyPipeline(_)) => {
            ExitCodes::INVALID_ARGS
        }
        Some(
            CoreError::AgentNotFound(_)
            | CoreError::InvalidAgent(_)
            | CoreError::Config(_)
            | CoreError::Toml(_)
            | CoreError::Io(_),
        ) => ExitCodes::CONFIG_ERROR,
        Some(CoreError::Provider(_) | CoreError::Timeout(_)) => ExitCodes::RUN_FAILED,
        _ => ExitCodes::GENERAL_ERROR,
    }
}
