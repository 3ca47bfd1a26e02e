//! Command implementations for subnet-agent.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations, plus the configuration loading they share.

mod config_cmd;
mod report;
mod resubmit;
mod run;

use crate::cli::{Cli, Command};
use std::path::Path;
use std::sync::Arc;
use subnet_agent::client::HttpValidatorClient;
use subnet_agent::config::{AgentConfig, ResolvedConfig};
use subnet_agent::error::Result;
use subnet_agent::submit::{ExecutionReportSubmitter, RetryPolicy, UndeliveredJournal};

/// Dispatch a command to its implementation.
pub async fn dispatch(cli: Cli) -> Result<()> {
    let config = load_config(&cli.config)?;
    match cli.command {
        Command::Run(args) => run::cmd_run(config, args).await,
        Command::Report(args) => report::cmd_report(config, args).await,
        Command::Resubmit => resubmit::cmd_resubmit(config).await,
        Command::Config(args) => config_cmd::cmd_config(&config, args),
    }
}

/// Config file (optional) with environment overrides applied.
fn load_config(path: &Path) -> Result<AgentConfig> {
    Ok(AgentConfig::load_or_default(path)?.with_process_env())
}

/// Submitter over HTTP with the configured retry policy and journal.
fn http_submitter(resolved: &ResolvedConfig) -> Result<ExecutionReportSubmitter> {
    let transport = HttpValidatorClient::new(
        resolved.identity.validator_url.clone(),
        resolved.runtime.request_timeout(),
    )?;
    let mut submitter = ExecutionReportSubmitter::new(
        Arc::new(transport),
        resolved.signing.clone(),
        RetryPolicy::from_config(&resolved.runtime.retry),
    );
    if let Some(path) = &resolved.runtime.undelivered_journal {
        submitter = submitter.with_journal(UndeliveredJournal::new(path));
    }
    Ok(submitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_config_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let config = AgentConfig::load_or_default(temp.path().join("absent.yaml")).unwrap();
        assert!(config.agent_id.is_none());
        assert_eq!(config.runtime.max_concurrent_tasks, 4);
    }

    #[test]
    fn submitter_uses_configured_journal() {
        let temp = TempDir::new().unwrap();
        let journal = temp.path().join("undelivered.ndjson");
        let yaml = format!(
            r#"
subnet_id: "0x{subnet}"
agent_id: agent-1
matcher_addr: localhost:8090
validator_addr: localhost:9090
capabilities: [news-analyser]
private_key: "1803db14a051184bd5fa6c23d8b98f7ed8dc35b643c16af0a7fd76149f48efdd"
runtime:
  undelivered_journal: "{journal}"
"#,
            subnet = "00".repeat(32),
            journal = journal.display()
        );
        let resolved = AgentConfig::from_yaml(&yaml).unwrap().resolve().unwrap();

        let submitter = http_submitter(&resolved).unwrap();
        assert_eq!(submitter.journal().unwrap().path(), journal.as_path());
    }
}
