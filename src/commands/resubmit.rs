//! Implementation of the `subnet-agent resubmit` command.
//!
//! Replays the undelivered-report journal. Delivered and permanently rejected
//! entries are removed; entries that still fail in transit stay for the next
//! attempt.

use super::http_submitter;
use subnet_agent::config::AgentConfig;
use subnet_agent::error::{AgentError, Result};

pub async fn cmd_resubmit(config: AgentConfig) -> Result<()> {
    let resolved = config.resolve()?;
    let submitter = http_submitter(&resolved)?;

    let summary = submitter.resubmit_journal().await?;

    println!("Journal replay finished");
    println!("  delivered: {}", summary.delivered);
    println!("  rejected:  {}", summary.rejected);
    println!("  remaining: {}", summary.remaining);

    if summary.remaining > 0 {
        return Err(AgentError::Transport(format!(
            "{} report(s) remain undelivered",
            summary.remaining
        )));
    }
    Ok(())
}
