//! Error types for the agent runtime.
//!
//! One variant per failure class of the marketplace protocol. Only
//! configuration and illegal-state errors are fatal to the process; bid and
//! task failures are contained by the component that produced them.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for agent operations.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Missing or invalid startup configuration. Prevents `start()`.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Lifecycle method invoked in the wrong state.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// Fault inside `should_bid`/`calculate_bid`. Treated as "no bid".
    #[error("bid evaluation failed: {0}")]
    BidEvaluation(String),

    /// Fault inside a handler. Captured into a failed task result.
    #[error("task execution failed: {0}")]
    TaskExecution(String),

    /// Transient network or connection fault.
    #[error("transport error: {0}")]
    Transport(String),

    /// Permanent rejection (bad signature, malformed payload).
    #[error("validation error: {0}")]
    Validation(String),

    /// The worker queue is full; the assignment was rejected.
    #[error("queue full: {0}")]
    QueueFull(String),

    /// Local file I/O (config, journal).
    #[error("{0}")]
    Io(String),
}

impl AgentError {
    /// Returns the process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            AgentError::Configuration(_) => exit_codes::CONFIG_ERROR,
            AgentError::Io(_) => exit_codes::CONFIG_ERROR,
            AgentError::IllegalState(_) => exit_codes::ILLEGAL_STATE,
            AgentError::Transport(_) => exit_codes::TRANSPORT_FAILURE,
            AgentError::QueueFull(_) => exit_codes::TRANSPORT_FAILURE,
            AgentError::Validation(_) => exit_codes::VALIDATION_FAILURE,
            AgentError::BidEvaluation(_) => exit_codes::VALIDATION_FAILURE,
            AgentError::TaskExecution(_) => exit_codes::VALIDATION_FAILURE,
        }
    }

    /// The detail text without the variant's prefix.
    pub fn message(&self) -> &str {
        match self {
            AgentError::Configuration(m)
            | AgentError::IllegalState(m)
            | AgentError::BidEvaluation(m)
            | AgentError::TaskExecution(m)
            | AgentError::Transport(m)
            | AgentError::Validation(m)
            | AgentError::QueueFull(m)
            | AgentError::Io(m) => m,
        }
    }

    /// Whether the error should be retried by the submission policy.
    pub fn is_transient(&self) -> bool {
        matches!(self, AgentError::Transport(_))
    }
}

/// Result type alias for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;
