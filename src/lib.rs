//! Subnet agent: the agent side of a decentralized task marketplace.
//!
//! An agent consumes intents from a matcher, bids on the ones it serves,
//! executes won assignments through pluggable handlers, and reports signed
//! execution outcomes to a validator.
//!
//! ```no_run
//! use std::sync::Arc;
//! use subnet_agent::bidding::FixedPriceStrategy;
//! use subnet_agent::config::ConfigBuilder;
//! use subnet_agent::handlers::CommandHandler;
//! use subnet_agent::lifecycle::Agent;
//!
//! # async fn example() -> subnet_agent::error::Result<()> {
//! let config = ConfigBuilder::new()
//!     .with_subnet_id(format!("0x{}", "00".repeat(32)))
//!     .with_agent_id("news-agent-001")
//!     .with_matcher_addr("localhost:8090")
//!     .with_validator_addr("localhost:9090")
//!     .with_capabilities(["news-analyser"])
//!     .build()
//!     .with_process_env();
//!
//! let mut agent = Agent::new(config);
//! agent.register_handler("news-*", Arc::new(CommandHandler::new("./analyse {task_id}")?))?;
//! agent.register_bidding_strategy(Arc::new(FixedPriceStrategy::new(10.0, "PIN")))?;
//! agent.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```

pub mod bidding;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod exit_codes;
pub mod fs;
pub mod handlers;
pub mod lifecycle;
pub mod logging;
pub mod protocol;
pub mod signing;
pub mod submit;

mod fault;

#[cfg(test)]
pub(crate) mod test_support;
