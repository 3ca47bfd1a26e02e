//! Implementation of the `subnet-agent report` command.
//!
//! Signs one execution report with the configured key and submits it with the
//! usual retry policy. Useful for reconciling an assignment by hand.

use super::http_submitter;
use crate::cli::ReportArgs;
use subnet_agent::config::AgentConfig;
use subnet_agent::error::Result;
use subnet_agent::protocol::{ExecutionReport, ReportClock};

pub async fn cmd_report(config: AgentConfig, args: ReportArgs) -> Result<()> {
    let resolved = config.resolve()?;
    let submitter = http_submitter(&resolved)?;

    let report = ExecutionReport {
        assignment_id: args.assignment_id,
        intent_id: args.intent_id,
        agent_id: resolved.identity.agent_id.clone(),
        status: args.status,
        timestamp: args.timestamp.unwrap_or_else(|| ReportClock::new().now()),
    };
    let assignment_id = report.assignment_id.clone();

    let ack = submitter.submit_single(report).await?;

    println!("Report for assignment '{}' accepted", assignment_id);
    if let Some(message) = ack.message {
        println!("  validator: {}", message);
    }
    Ok(())
}
