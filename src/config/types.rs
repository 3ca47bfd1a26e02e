//! Configuration types and defaults.
//!
//! This module defines the runtime tuning block, the retry policy settings,
//! and the redacting wrapper for the private key.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Hex-encoded private key.
///
/// Never printed: `Debug` and `Serialize` both emit `<redacted>`.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct PrivateKey(String);

impl PrivateKey {
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl Serialize for PrivateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("<redacted>")
    }
}

// Default value functions for serde
pub(crate) fn default_max_concurrent_tasks() -> usize {
    4
}
pub(crate) fn default_queue_depth() -> usize {
    16
}
pub(crate) fn default_task_timeout_secs() -> u64 {
    300
}
pub(crate) fn default_cancel_grace_ms() -> u64 {
    1000
}
pub(crate) fn default_shutdown_grace_secs() -> u64 {
    30
}
pub(crate) fn default_poll_interval_ms() -> u64 {
    1000
}
pub(crate) fn default_request_timeout_secs() -> u64 {
    10
}
pub(crate) fn default_max_attempts() -> u32 {
    5
}
pub(crate) fn default_initial_backoff_ms() -> u64 {
    200
}
pub(crate) fn default_max_backoff_ms() -> u64 {
    5000
}

/// Tuning for the worker pool, deadlines and network calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum simultaneously executing tasks.
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,

    /// Assignments that may wait for a worker before new ones are rejected.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,

    /// Per-task deadline.
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,

    /// How long a cancelled handler may take to wind down before it is aborted.
    #[serde(default = "default_cancel_grace_ms")]
    pub cancel_grace_ms: u64,

    /// How long `stop()` waits for in-flight tasks before cancelling them.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Delay between matcher polls when no events are pending.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Timeout for a single HTTP request to the matcher or validator.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Retry policy for report submission.
    #[serde(default)]
    pub retry: RetryConfig,

    /// NDJSON file receiving reports whose delivery exhausted all retries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undelivered_journal: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent_tasks(),
            queue_depth: default_queue_depth(),
            task_timeout_secs: default_task_timeout_secs(),
            cancel_grace_ms: default_cancel_grace_ms(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            retry: RetryConfig::default(),
            undelivered_journal: None,
        }
    }
}

impl RuntimeConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Exponential backoff settings for transport-classified failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt; doubled for each later attempt.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound for a single delay.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}
