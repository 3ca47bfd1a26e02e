//! Config loading, environment overrides, and validation.

use super::model::{AgentConfig, AgentIdentity, ResolvedConfig};
use super::types::{PrivateKey, RuntimeConfig};
use crate::error::{AgentError, Result};
use crate::signing::SigningContext;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

pub const ENV_SUBNET_ID: &str = "SUBNET_ID";
pub const ENV_AGENT_ID: &str = "AGENT_ID";
pub const ENV_CHAIN_ADDRESS: &str = "CHAIN_ADDRESS";
pub const ENV_MATCHER_ADDRESS: &str = "MATCHER_ADDRESS";
pub const ENV_VALIDATOR_ADDRESS: &str = "VALIDATOR_ADDRESS";
pub const ENV_PRIVATE_KEY: &str = "PRIVATE_KEY";
pub const ENV_CAPABILITIES: &str = "CAPABILITIES";
pub const ENV_INTENT_TYPES: &str = "INTENT_TYPES";

static SUBNET_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{64}$").expect("valid regex"));
static CHAIN_ADDRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("valid regex"));

impl AgentConfig {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            AgentError::Configuration(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Load config from a YAML file if it exists, otherwise start from defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            AgentError::Configuration(format!("failed to parse config YAML: {}", e))
        })
    }

    /// Serialize config to a YAML string. The private key is redacted.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            AgentError::Configuration(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Apply overrides from the process environment.
    pub fn with_process_env(self) -> Self {
        self.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Empty values are ignored. List variables are comma separated.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get(ENV_SUBNET_ID) {
            self.subnet_id = Some(v);
        }
        if let Some(v) = get(ENV_AGENT_ID) {
            self.agent_id = Some(v);
        }
        if let Some(v) = get(ENV_CHAIN_ADDRESS) {
            self.chain_address = Some(v);
        }
        if let Some(v) = get(ENV_MATCHER_ADDRESS) {
            self.matcher_addr = Some(v);
        }
        if let Some(v) = get(ENV_VALIDATOR_ADDRESS) {
            self.validator_addr = Some(v);
        }
        if let Some(v) = get(ENV_PRIVATE_KEY) {
            self.private_key = Some(PrivateKey::new(v));
        }
        if let Some(v) = get(ENV_CAPABILITIES) {
            self.capabilities = split_list(&v);
        }
        if let Some(v) = get(ENV_INTENT_TYPES) {
            self.intent_types = split_list(&v);
        }
        self
    }

    /// Validate and freeze the configuration.
    ///
    /// All problems are collected and returned together in a single
    /// `AgentError::Configuration`.
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let mut problems = Vec::new();

        let subnet_id = required(&self.subnet_id, "subnet_id", ENV_SUBNET_ID, &mut problems);
        if let Some(ref id) = subnet_id
            && !SUBNET_ID_RE.is_match(id)
        {
            problems.push(format!(
                "subnet_id must be 0x followed by 64 hex digits (found '{}')",
                id
            ));
        }

        let agent_id = required(&self.agent_id, "agent_id", ENV_AGENT_ID, &mut problems);

        let chain_address = self
            .chain_address
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if let Some(ref addr) = chain_address
            && !CHAIN_ADDRESS_RE.is_match(addr)
        {
            problems.push(format!(
                "chain_address must be 0x followed by 40 hex digits (found '{}')",
                addr
            ));
        }

        let matcher_addr = required(
            &self.matcher_addr,
            "matcher_addr",
            ENV_MATCHER_ADDRESS,
            &mut problems,
        );
        let validator_addr = required(
            &self.validator_addr,
            "validator_addr",
            ENV_VALIDATOR_ADDRESS,
            &mut problems,
        );

        let signing = match self.private_key.as_ref().filter(|k| !k.is_empty()) {
            None => {
                problems.push(format!(
                    "missing required field 'private_key' (set it in the config file or {})",
                    ENV_PRIVATE_KEY
                ));
                None
            }
            Some(key) => match SigningContext::from_hex(key.expose()) {
                Ok(ctx) => Some(ctx),
                Err(AgentError::Configuration(msg)) => {
                    problems.push(msg);
                    None
                }
                Err(other) => return Err(other),
            },
        };

        let capabilities = clean_list(&self.capabilities);
        if capabilities.is_empty() {
            problems.push(format!(
                "at least one capability is required (set 'capabilities' or {})",
                ENV_CAPABILITIES
            ));
        }

        validate_runtime(&self.runtime, &mut problems);

        if !problems.is_empty() {
            return Err(AgentError::Configuration(format!(
                "config validation failed:\n  - {}",
                problems.join("\n  - ")
            )));
        }

        match (subnet_id, agent_id, matcher_addr, validator_addr, signing) {
            (
                Some(subnet_id),
                Some(agent_id),
                Some(matcher_addr),
                Some(validator_addr),
                Some(signing),
            ) => Ok(ResolvedConfig {
                identity: AgentIdentity {
                    subnet_id,
                    agent_id,
                    chain_address,
                    matcher_url: endpoint_url(&matcher_addr, self.secure),
                    validator_url: endpoint_url(&validator_addr, self.secure),
                    capabilities,
                    intent_types: clean_list(&self.intent_types),
                },
                signing,
                runtime: self.runtime.clone(),
            }),
            _ => Err(AgentError::Configuration(
                "config validation failed: required fields missing".to_string(),
            )),
        }
    }
}

/// Turn an address into a base URL.
///
/// `host:port` gets `http://` (or `https://` when `secure`); an address that
/// already carries a scheme is kept as is. Trailing slashes are removed.
pub fn endpoint_url(addr: &str, secure: bool) -> String {
    let addr = addr.trim().trim_end_matches('/');
    if addr.contains("://") {
        addr.to_string()
    } else if secure {
        format!("https://{}", addr)
    } else {
        format!("http://{}", addr)
    }
}

fn required(
    value: &Option<String>,
    field: &str,
    env: &str,
    problems: &mut Vec<String>,
) -> Option<String> {
    match value.as_ref().map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(v) => Some(v.to_string()),
        None => {
            problems.push(format!(
                "missing required field '{}' (set it in the config file or {})",
                field, env
            ));
            None
        }
    }
}

fn validate_runtime(runtime: &RuntimeConfig, problems: &mut Vec<String>) {
    if runtime.max_concurrent_tasks == 0 {
        problems.push("runtime.max_concurrent_tasks must be greater than 0".to_string());
    }
    if runtime.queue_depth == 0 {
        problems.push("runtime.queue_depth must be greater than 0".to_string());
    }
    if runtime.task_timeout_secs == 0 {
        problems.push("runtime.task_timeout_secs must be greater than 0".to_string());
    }
    if runtime.request_timeout_secs == 0 {
        problems.push("runtime.request_timeout_secs must be greater than 0".to_string());
    }
    if runtime.retry.max_attempts == 0 {
        problems.push("runtime.retry.max_attempts must be greater than 0".to_string());
    }
    if runtime.retry.initial_backoff_ms > runtime.retry.max_backoff_ms {
        problems.push(format!(
            "runtime.retry.initial_backoff_ms ({}) must not exceed max_backoff_ms ({})",
            runtime.retry.initial_backoff_ms, runtime.retry.max_backoff_ms
        ));
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn clean_list(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for v in values {
        let v = v.trim();
        if !v.is_empty() && !out.iter().any(|existing| existing == v) {
            out.push(v.to_string());
        }
    }
    out
}
