//! Execution reports and batch submission shapes.

use super::Assignment;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};

/// Outcome status recorded in an execution report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Success,
    Failure,
    /// The per-task deadline elapsed.
    Timeout,
    /// Shutdown cancelled the task before it finished.
    Cancelled,
    /// The worker queue was full and the assignment was never started.
    Rejected,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Success => "SUCCESS",
            ReportStatus::Failure => "FAILURE",
            ReportStatus::Timeout => "TIMEOUT",
            ReportStatus::Cancelled => "CANCELLED",
            ReportStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a wire name, case-insensitively.
impl FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SUCCESS" => Ok(Self::Success),
            "FAILURE" => Ok(Self::Failure),
            "TIMEOUT" => Ok(Self::Timeout),
            "CANCELLED" => Ok(Self::Cancelled),
            "REJECTED" => Ok(Self::Rejected),
            _ => Err(format!(
                "unknown status '{}' (expected SUCCESS, FAILURE, TIMEOUT, CANCELLED or REJECTED)",
                s
            )),
        }
    }
}

/// The record of a task's outcome sent to the validator.
///
/// `assignment_id` is the idempotency key: resubmitting the same report is
/// the same logical event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub assignment_id: String,
    pub intent_id: String,
    pub agent_id: String,
    pub status: ReportStatus,
    /// Unix seconds.
    pub timestamp: i64,
}

impl ExecutionReport {
    /// Build the report for an assignment.
    pub fn for_assignment(
        assignment: &Assignment,
        agent_id: &str,
        status: ReportStatus,
        timestamp: i64,
    ) -> Self {
        Self {
            assignment_id: assignment.assignment_id.clone(),
            intent_id: assignment.intent_id.clone(),
            agent_id: agent_id.to_string(),
            status,
            timestamp,
        }
    }

    /// Structural checks performed before a report leaves the agent.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.assignment_id.trim().is_empty() {
            return Err("assignment_id must not be empty".to_string());
        }
        if self.intent_id.trim().is_empty() {
            return Err("intent_id must not be empty".to_string());
        }
        if self.agent_id.trim().is_empty() {
            return Err("agent_id must not be empty".to_string());
        }
        if self.timestamp <= 0 {
            return Err(format!("timestamp must be positive (got {})", self.timestamp));
        }
        Ok(())
    }
}

/// An execution report with its signature and the signer's public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedExecutionReport {
    #[serde(flatten)]
    pub report: ExecutionReport,
    /// Hex-encoded compact ECDSA signature.
    pub signature: String,
    /// Hex-encoded compressed public key.
    pub public_key: String,
}

/// Batch submission request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReportBatchRequest {
    pub reports: Vec<SignedExecutionReport>,
    pub partial_ok: bool,
}

/// A per-item failure in a batch response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItemError {
    pub index: usize,
    pub message: String,
}

/// Aggregated outcome of a batch submission.
///
/// `success_count + failed_count` always equals the number of submitted
/// reports once the submitter has normalized the response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchResponse {
    #[serde(rename = "success")]
    pub success_count: usize,
    #[serde(rename = "failed")]
    pub failed_count: usize,
    #[serde(default)]
    pub errors: Vec<BatchItemError>,
}

impl BatchResponse {
    /// A response in which every report failed.
    pub fn all_failed(total: usize, errors: Vec<BatchItemError>) -> Self {
        Self {
            success_count: 0,
            failed_count: total,
            errors,
        }
    }

    pub fn total(&self) -> usize {
        self.success_count + self.failed_count
    }
}

/// Validator acknowledgment for a single report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitAck {
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Issues report timestamps that never decrease for one agent, even if the
/// wall clock steps backwards.
#[derive(Debug, Default)]
pub struct ReportClock {
    last: AtomicI64,
}

impl ReportClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current unix seconds, clamped to be >= every previously issued value.
    pub fn now(&self) -> i64 {
        self.issue(Utc::now().timestamp())
    }

    fn issue(&self, wall: i64) -> i64 {
        let previous = self.last.fetch_max(wall, Ordering::SeqCst);
        previous.max(wall)
    }
}
