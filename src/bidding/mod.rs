//! Bid decisions.
//!
//! A `BiddingStrategy` is a pure decision component: `should_bid` filters
//! intents and `calculate_bid` prices the ones that pass. `evaluate_intent`
//! is the call boundary that guarantees:
//!
//! - `calculate_bid` runs only after `should_bid` returned `true`
//! - an error or a panic in either method becomes a `BidEvaluation` error,
//!   never a crash
//! - an invalid bid (negative or non-finite price, empty currency) is dropped

mod fixed;

pub use fixed::FixedPriceStrategy;

use crate::error::{AgentError, Result};
use crate::fault::contain;
use crate::protocol::{Bid, Intent};
use tracing::{debug, warn};

/// Decides whether and how much to bid on an intent.
///
/// Implementations must not write shared mutable state: both methods may run
/// concurrently for independent intents.
pub trait BiddingStrategy: Send + Sync {
    /// Whether the agent should bid on `intent`.
    fn should_bid(&self, intent: &Intent) -> anyhow::Result<bool>;

    /// Price the bid. Only called when `should_bid` returned `true`.
    fn calculate_bid(&self, intent: &Intent) -> anyhow::Result<Bid>;
}

/// Evaluate an intent against a strategy.
///
/// Returns `Ok(None)` when the strategy declines and an error when the
/// strategy faulted or produced an invalid bid.
pub fn evaluate_intent(strategy: &dyn BiddingStrategy, intent: &Intent) -> Result<Option<Bid>> {
    let should_bid = contain(|| strategy.should_bid(intent))
        .map_err(|msg| {
            AgentError::BidEvaluation(format!(
                "should_bid panicked for intent '{}': {}",
                intent.id, msg
            ))
        })?
        .map_err(|e| {
            AgentError::BidEvaluation(format!(
                "should_bid failed for intent '{}': {:#}",
                intent.id, e
            ))
        })?;

    if !should_bid {
        debug!(
            intent_id = %intent.id,
            intent_type = %intent.intent_type,
            "strategy declined intent"
        );
        return Ok(None);
    }

    let bid = contain(|| strategy.calculate_bid(intent))
        .map_err(|msg| {
            AgentError::BidEvaluation(format!(
                "calculate_bid panicked for intent '{}': {}",
                intent.id, msg
            ))
        })?
        .map_err(|e| {
            AgentError::BidEvaluation(format!(
                "calculate_bid failed for intent '{}': {:#}",
                intent.id, e
            ))
        })?;

    bid.validate().map_err(|msg| {
        AgentError::BidEvaluation(format!("invalid bid for intent '{}': {}", intent.id, msg))
    })?;

    Ok(Some(bid))
}

/// Evaluate an intent, logging any fault and treating it as "do not bid".
pub fn decide(strategy: &dyn BiddingStrategy, intent: &Intent) -> Option<Bid> {
    match evaluate_intent(strategy, intent) {
        Ok(bid) => bid,
        Err(e) => {
            warn!(intent_id = %intent.id, error = %e, "bid evaluation failed; not bidding");
            None
        }
    }
}
