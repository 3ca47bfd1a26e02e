//! Fixed-price bidding strategy.

use super::BiddingStrategy;
use crate::config::AgentIdentity;
use crate::error::{AgentError, Result};
use crate::protocol::{Bid, DEFAULT_CURRENCY, Intent};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::BTreeMap;
use tracing::debug;

/// Bids a constant price on every intent it can serve.
///
/// An intent is accepted when its type matches one of the configured
/// intent-type patterns (every type when none are configured) and every
/// capability it requires is among the agent's capabilities. The bid carries
/// the agent's capabilities as `metadata["capabilities"]`.
#[derive(Debug, Clone)]
pub struct FixedPriceStrategy {
    price: f64,
    currency: String,
    intent_types: Option<GlobSet>,
    capabilities: Vec<String>,
    metadata: BTreeMap<String, String>,
}

impl FixedPriceStrategy {
    pub fn new(price: f64, currency: impl Into<String>) -> Self {
        Self {
            price,
            currency: currency.into(),
            intent_types: None,
            capabilities: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// A strategy matching the agent's configured intent types and capabilities.
    pub fn for_identity(identity: &AgentIdentity, price: f64) -> Result<Self> {
        Ok(Self::new(price, DEFAULT_CURRENCY)
            .with_intent_types(&identity.intent_types)?
            .with_capabilities(identity.capabilities.iter().cloned()))
    }

    /// Restrict bidding to intent types matching these glob patterns.
    pub fn with_intent_types<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self> {
        if patterns.is_empty() {
            self.intent_types = None;
            return Ok(self);
        }

        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = Glob::new(pattern).map_err(|e| {
                AgentError::Configuration(format!(
                    "invalid intent type pattern '{}': {}",
                    pattern, e
                ))
            })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|e| {
            AgentError::Configuration(format!("failed to build intent type patterns: {}", e))
        })?;
        self.intent_types = Some(set);
        Ok(self)
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    fn type_matches(&self, intent: &Intent) -> bool {
        self.intent_types
            .as_ref()
            .is_none_or(|set| set.is_match(&intent.intent_type))
    }

    fn missing_capabilities<'a>(&self, intent: &'a Intent) -> Vec<&'a str> {
        intent
            .capabilities_required
            .iter()
            .filter(|required| !self.capabilities.iter().any(|own| own == *required))
            .map(String::as_str)
            .collect()
    }
}

impl BiddingStrategy for FixedPriceStrategy {
    fn should_bid(&self, intent: &Intent) -> anyhow::Result<bool> {
        if !self.type_matches(intent) {
            debug!(
                intent_id = %intent.id,
                intent_type = %intent.intent_type,
                "intent type not served"
            );
            return Ok(false);
        }

        let missing = self.missing_capabilities(intent);
        if !missing.is_empty() {
            debug!(intent_id = %intent.id, missing = ?missing, "missing required capabilities");
            return Ok(false);
        }

        Ok(true)
    }

    fn calculate_bid(&self, _intent: &Intent) -> anyhow::Result<Bid> {
        let mut bid = Bid::new(self.price, self.currency.clone());
        bid.metadata = self.metadata.clone();
        if !self.capabilities.is_empty() {
            bid.metadata
                .insert("capabilities".to_string(), self.capabilities.join(","));
        }
        Ok(bid)
    }
}
