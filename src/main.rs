//! subnet-agent: marketplace agent runtime.
//!
//! This is the main entry point for the `subnet-agent` CLI. It loads `.env`,
//! parses arguments, sets up logging, dispatches to the appropriate command
//! handler on a tokio runtime, and handles errors with proper exit codes.

mod cli;
mod commands;

use cli::Cli;
use std::process::ExitCode;
use subnet_agent::error::AgentError;
use subnet_agent::{exit_codes, logging};

fn main() -> ExitCode {
    // A missing .env file is normal.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    logging::init(cli.verbose);

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| AgentError::Io(format!("failed to start async runtime: {}", e)))
        .and_then(|runtime| runtime.block_on(commands::dispatch(cli)));

    match result {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            // Print user-actionable error message to stderr
            eprintln!("Error: {}", err);

            // Return appropriate exit code
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
