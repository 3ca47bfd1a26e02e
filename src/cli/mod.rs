//! CLI argument parsing for subnet-agent.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use subnet_agent::protocol::ReportStatus;

/// Subnet agent: bid on marketplace intents, execute tasks, report to validators.
///
/// Configuration comes from a YAML file, a `.env` file and the process
/// environment (SUBNET_ID, AGENT_ID, CHAIN_ADDRESS, MATCHER_ADDRESS,
/// VALIDATOR_ADDRESS, PRIVATE_KEY, CAPABILITIES, INTENT_TYPES), in that
/// order of increasing precedence.
#[derive(Parser, Debug)]
#[command(name = "subnet-agent")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the agent configuration file.
    #[arg(short, long, global = true, default_value = "agent.yaml")]
    pub config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for subnet-agent.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the agent until interrupted.
    ///
    /// Connects to the matcher, bids a fixed price on matching intents and
    /// executes won tasks with the given command.
    Run(RunArgs),

    /// Sign and submit a single execution report.
    Report(ReportArgs),

    /// Replay reports from the undelivered journal.
    Resubmit,

    /// Print the effective configuration (private key redacted).
    Config(ConfigArgs),
}

/// Arguments for the `run` command.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Command executed per task. Task data is written to stdin and stdout
    /// becomes the result. Placeholders: {task_id}, {assignment_id},
    /// {intent_id}, {intent_type}.
    #[arg(long)]
    pub handler_command: String,

    /// Bid price for every intent the agent serves.
    #[arg(long, default_value_t = 10.0)]
    pub price: f64,

    /// Bid currency.
    #[arg(long, default_value = "PIN")]
    pub currency: String,
}

/// Arguments for the `report` command.
#[derive(Parser, Debug)]
pub struct ReportArgs {
    /// Assignment the report is about (the idempotency key).
    #[arg(long)]
    pub assignment_id: String,

    #[arg(long)]
    pub intent_id: String,

    /// SUCCESS, FAILURE, TIMEOUT, CANCELLED or REJECTED.
    #[arg(long, value_parser = parse_status)]
    pub status: ReportStatus,

    /// Unix seconds. Defaults to now.
    #[arg(long)]
    pub timestamp: Option<i64>,
}

/// Arguments for the `config` command.
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Validate the configuration and fail if it is incomplete.
    #[arg(long)]
    pub check: bool,
}

fn parse_status(s: &str) -> Result<ReportStatus, String> {
    s.parse()
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
