//! Implementation of the `subnet-agent run` command.
//!
//! Wires a `CommandHandler` and a `FixedPriceStrategy` into an `Agent` and
//! runs it until SIGINT or SIGTERM.

use crate::cli::RunArgs;
use std::sync::Arc;
use subnet_agent::bidding::FixedPriceStrategy;
use subnet_agent::config::AgentConfig;
use subnet_agent::error::{AgentError, Result};
use subnet_agent::handlers::CommandHandler;
use subnet_agent::lifecycle::Agent;
use tracing::{error, info};

pub async fn cmd_run(config: AgentConfig, args: RunArgs) -> Result<()> {
    let identity = config.resolve()?.identity;

    let handler = Arc::new(CommandHandler::new(&args.handler_command)?);
    let strategy = FixedPriceStrategy::new(args.price, &args.currency)
        .with_intent_types(&identity.intent_types)?
        .with_capabilities(identity.capabilities.iter().cloned());

    let mut agent = Agent::new(config);
    if identity.intent_types.is_empty() {
        agent.register_default_handler(handler)?;
    } else {
        for pattern in &identity.intent_types {
            agent.register_handler(pattern, handler.clone())?;
        }
    }
    agent.register_bidding_strategy(Arc::new(strategy))?;

    let summary = agent.run_until(termination_signal()).await?;

    println!("Agent stopped");
    println!("  completed:  {}", summary.completed);
    println!("  cancelled:  {}", summary.cancelled);
    println!("  rejected:   {}", summary.rejected);
    println!("  unreported: {}", summary.unreported);

    if summary.unreported > 0 {
        return Err(AgentError::Transport(format!(
            "{} execution report(s) could not be delivered; \
             run `subnet-agent resubmit` once the validator is reachable",
            summary.unreported
        )));
    }
    Ok(())
}

/// Resolves on the first SIGINT (or SIGTERM on unix).
async fn termination_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}
