//! Network collaborators: the matcher and the validator.
//!
//! Both are reached through traits so the lifecycle and the submitter can be
//! driven by in-process fakes. The HTTP implementations classify failures into
//! `AgentError::Transport` (retryable) and `AgentError::Validation`
//! (permanent).

mod http;
mod matcher;
mod validator;

pub use matcher::HttpMatcherClient;
pub use validator::HttpValidatorClient;

use crate::error::Result;
use crate::protocol::{
    AgentRegistration, Bid, BatchResponse, ExecutionReportBatchRequest, MatcherEvent,
    SignedExecutionReport, SubmitAck, TaskResultSubmission,
};
use async_trait::async_trait;

/// Connection to the matcher service.
#[async_trait]
pub trait MatcherClient: Send + Sync {
    /// Announce the agent profile. Called once by `start()`.
    async fn connect(&self, registration: &AgentRegistration) -> Result<()>;

    /// Fetch the events that arrived since the last poll.
    async fn poll(&self) -> Result<Vec<MatcherEvent>>;

    async fn submit_bid(&self, intent_id: &str, bid: &Bid) -> Result<()>;

    /// Return a task's result to its requester.
    async fn submit_result(&self, result: &TaskResultSubmission) -> Result<()>;

    async fn close(&self) {}
}

/// Delivery of signed reports to the validator.
///
/// Implementations perform a single attempt; retry policy lives in the
/// submitter.
#[async_trait]
pub trait ValidatorTransport: Send + Sync {
    async fn submit_report(&self, report: &SignedExecutionReport) -> Result<SubmitAck>;

    async fn submit_batch(&self, request: &ExecutionReportBatchRequest) -> Result<BatchResponse>;

    async fn close(&self) {}
}
