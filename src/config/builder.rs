//! Fluent construction of `AgentConfig` in code.

use super::model::AgentConfig;
use super::types::{PrivateKey, RuntimeConfig};

/// Builder for `AgentConfig`.
///
/// `build()` does not validate; validation happens once in
/// `AgentConfig::resolve`, which the agent calls before opening any
/// connection.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: AgentConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing config (e.g. one loaded from YAML).
    pub fn from_config(config: AgentConfig) -> Self {
        Self { config }
    }

    pub fn with_subnet_id(mut self, subnet_id: impl Into<String>) -> Self {
        self.config.subnet_id = Some(subnet_id.into());
        self
    }

    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.config.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_chain_address(mut self, chain_address: impl Into<String>) -> Self {
        self.config.chain_address = Some(chain_address.into());
        self
    }

    pub fn with_matcher_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.matcher_addr = Some(addr.into());
        self
    }

    pub fn with_validator_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.validator_addr = Some(addr.into());
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.config.secure = secure;
        self
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_intent_types<I, S>(mut self, intent_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.intent_types = intent_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_private_key(mut self, key_hex: impl Into<String>) -> Self {
        self.config.private_key = Some(PrivateKey::new(key_hex));
        self
    }

    pub fn with_runtime(mut self, runtime: RuntimeConfig) -> Self {
        self.config.runtime = runtime;
        self
    }

    pub fn build(self) -> AgentConfig {
        self.config
    }
}
