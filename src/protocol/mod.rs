//! Marketplace protocol model.
//!
//! Message shapes exchanged with the matcher and the validator:
//!
//! - **Intent** (inbound): advertised work an agent may bid on
//! - **Bid** (outbound): the agent's price for an intent
//! - **Assignment** (inbound): a won bid, carrying the concrete **Task**
//! - **TaskResult**: the outcome of one handler invocation
//! - **ExecutionReport** (outbound): the signed record sent to the validator
//!
//! Intents are ephemeral; a task is consumed by exactly one handler
//! invocation; a result is immutable once produced.

mod encoding;
mod report;
mod result;

pub use encoding::base64_bytes;
pub use report::{
    BatchItemError, BatchResponse, ExecutionReport, ExecutionReportBatchRequest, ReportClock,
    ReportStatus, SignedExecutionReport, SubmitAck,
};
pub use result::{FailureKind, ResultEnvelope, TaskResult};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default currency symbol for bids.
pub const DEFAULT_CURRENCY: &str = "PIN";

/// A unit of advertised work broadcast by the matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub id: String,
    #[serde(rename = "type")]
    pub intent_type: String,
    #[serde(default)]
    pub capabilities_required: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Intent {
    pub fn new(id: impl Into<String>, intent_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            intent_type: intent_type.into(),
            capabilities_required: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities_required = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// An agent's offer to perform an intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub price: f64,
    pub currency: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Bid {
    pub fn new(price: f64, currency: impl Into<String>) -> Self {
        Self {
            price,
            currency: currency.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Check the bid invariants: finite non-negative price, non-empty currency.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.price.is_finite() {
            return Err(format!("bid price must be finite (got {})", self.price));
        }
        if self.price < 0.0 {
            return Err(format!("bid price must be >= 0 (got {})", self.price));
        }
        if self.currency.trim().is_empty() {
            return Err("bid currency must not be empty".to_string());
        }
        Ok(())
    }
}

/// The concrete unit of work handed to a handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub assignment_id: String,
    #[serde(with = "base64_bytes", default)]
    pub data: Vec<u8>,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        assignment_id: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            id: id.into(),
            assignment_id: assignment_id.into(),
            data: data.into(),
        }
    }
}

/// The outcome of a won bid: pairs this agent with a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub assignment_id: String,
    pub intent_id: String,
    pub intent_type: String,
    pub task: Task,
}

/// Agent profile announced to the matcher on connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRegistration {
    pub agent_id: String,
    pub subnet_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_address: Option<String>,
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub intent_types: Vec<String>,
    /// Compressed secp256k1 public key (hex) that signs this agent's reports.
    pub public_key: String,
}

/// A bid as posted to the matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidSubmission {
    pub agent_id: String,
    pub intent_id: String,
    #[serde(flatten)]
    pub bid: Bid,
}

/// A task outcome returned to the requester through the matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResultSubmission {
    pub agent_id: String,
    pub assignment_id: String,
    pub task_id: String,
    pub success: bool,
    #[serde(with = "base64_bytes", default)]
    pub data: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskResultSubmission {
    pub fn new(agent_id: &str, assignment: &Assignment, result: &TaskResult) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            assignment_id: assignment.assignment_id.clone(),
            task_id: assignment.task.id.clone(),
            success: result.is_success(),
            data: result.data().to_vec(),
            error: result.error().map(str::to_string),
        }
    }
}

/// Events delivered by the matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatcherEvent {
    Intent(Intent),
    Assignment(Assignment),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_parses_wire_shape() {
        let json = r#"{
            "id": "i1",
            "type": "news-analyser",
            "capabilities_required": ["news-analyser"],
            "metadata": {"region": "eu"}
        }"#;
        let intent: Intent = serde_json::from_str(json).unwrap();
        assert_eq!(intent.id, "i1");
        assert_eq!(intent.intent_type, "news-analyser");
        assert_eq!(intent.capabilities_required, vec!["news-analyser"]);
        assert_eq!(intent.metadata.get("region").map(String::as_str), Some("eu"));
    }

    #[test]
    fn intent_optional_fields_default() {
        let intent: Intent = serde_json::from_str(r#"{"id":"i1","type":"t"}"#).unwrap();
        assert!(intent.capabilities_required.is_empty());
        assert!(intent.metadata.is_empty());
    }

    #[test]
    fn bid_validation() {
        assert!(Bid::new(10.0, "PIN").validate().is_ok());
        assert!(Bid::new(0.0, "PIN").validate().is_ok());
        assert!(Bid::new(-1.0, "PIN").validate().is_err());
        assert!(Bid::new(f64::NAN, "PIN").validate().is_err());
        assert!(Bid::new(f64::INFINITY, "PIN").validate().is_err());
        assert!(Bid::new(1.0, "  ").validate().is_err());
    }

    #[test]
    fn bid_submission_flattens_bid() {
        let submission = BidSubmission {
            agent_id: "agent-1".to_string(),
            intent_id: "i1".to_string(),
            bid: Bid::new(10.0, "PIN").with_metadata("capabilities", "news-analyser"),
        };
        let value = serde_json::to_value(&submission).unwrap();
        assert_eq!(value["price"], 10.0);
        assert_eq!(value["currency"], "PIN");
        assert_eq!(value["metadata"]["capabilities"], "news-analyser");
        assert_eq!(value["intent_id"], "i1");
    }

    #[test]
    fn matcher_events_are_tagged_by_kind() {
        let json = r#"[
            {"kind": "intent", "id": "i1", "type": "stock-analysis"},
            {"kind": "assignment", "assignment_id": "a1", "intent_id": "i1",
             "intent_type": "stock-analysis",
             "task": {"id": "t1", "assignment_id": "a1", "data": "e30="}}
        ]"#;
        let events: Vec<MatcherEvent> = serde_json::from_str(json).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], MatcherEvent::Intent(i) if i.id == "i1"));
        match &events[1] {
            MatcherEvent::Assignment(a) => {
                assert_eq!(a.assignment_id, "a1");
                assert_eq!(a.task.data, b"{}".to_vec());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
