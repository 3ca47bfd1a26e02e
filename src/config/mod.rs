//! Configuration model for the agent.
//!
//! `AgentConfig` is the raw, serde-friendly form loaded from YAML, the
//! builder, and the process environment. Unknown YAML fields are ignored and
//! optional fields have defaults. `AgentConfig::resolve` validates it once at
//! startup into an immutable `ResolvedConfig` that every component receives
//! explicitly.

mod builder;
mod model;
mod operations;
pub mod types;


// Re-export public API
pub use builder::ConfigBuilder;
pub use model::{AgentConfig, AgentIdentity, ResolvedConfig};
pub use operations::{
    ENV_AGENT_ID, ENV_CAPABILITIES, ENV_CHAIN_ADDRESS, ENV_INTENT_TYPES, ENV_MATCHER_ADDRESS,
    ENV_PRIVATE_KEY, ENV_SUBNET_ID, ENV_VALIDATOR_ADDRESS, endpoint_url,
};
pub use types::{PrivateKey, RetryConfig, RuntimeConfig};
