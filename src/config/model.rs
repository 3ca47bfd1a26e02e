//! Config struct definitions.

use super::types::*;
use crate::signing::SigningContext;
use serde::{Deserialize, Serialize};

/// Raw agent configuration.
///
/// Every field may be absent here; `resolve()` decides what is required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    // =========================================================================
    // Identity
    // =========================================================================
    /// Subnet the agent serves (`0x` + 64 hex digits).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,

    /// Agent identifier announced to the matcher and stamped on reports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,

    /// On-chain address of the agent operator (`0x` + 40 hex digits).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_address: Option<String>,

    // =========================================================================
    // Endpoints
    // =========================================================================
    /// Matcher address, `host:port` or a full URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matcher_addr: Option<String>,

    /// Validator address, `host:port` or a full URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validator_addr: Option<String>,

    /// Use https for addresses given without a scheme.
    pub secure: bool,

    // =========================================================================
    // Capabilities
    // =========================================================================
    /// Capabilities advertised to the matcher.
    pub capabilities: Vec<String>,

    /// Intent types the agent bids on. Empty means every type.
    pub intent_types: Vec<String>,

    // =========================================================================
    // Signing
    // =========================================================================
    /// Hex-encoded secp256k1 private key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<PrivateKey>,

    // =========================================================================
    // Runtime
    // =========================================================================
    pub runtime: RuntimeConfig,
}

/// Validated identity and endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentIdentity {
    pub subnet_id: String,
    pub agent_id: String,
    pub chain_address: Option<String>,
    pub matcher_url: String,
    pub validator_url: String,
    pub capabilities: Vec<String>,
    pub intent_types: Vec<String>,
}

/// Immutable configuration built once at startup.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub identity: AgentIdentity,
    pub signing: SigningContext,
    pub runtime: RuntimeConfig,
}
