//! In-process fakes shared by unit tests.

use crate::client::{MatcherClient, ValidatorTransport};
use crate::dispatch::{Handler, TaskContext};
use crate::error::{AgentError, Result};
use crate::protocol::{
    AgentRegistration, Assignment, BatchItemError, BatchResponse, Bid, ExecutionReportBatchRequest,
    Intent, MatcherEvent, SignedExecutionReport, SubmitAck, Task, TaskResult,
    TaskResultSubmission,
};
use crate::signing::SigningContext;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Fixed secp256k1 test key.
pub(crate) const TEST_KEY: &str =
    "1803db14a051184bd5fa6c23d8b98f7ed8dc35b643c16af0a7fd76149f48efdd";

pub(crate) fn signing_context() -> SigningContext {
    SigningContext::from_hex(TEST_KEY).unwrap()
}

pub(crate) fn assignment(task_id: &str, intent_type: &str, data: &[u8]) -> Assignment {
    let assignment_id = format!("assign-{}", task_id);
    Assignment {
        assignment_id: assignment_id.clone(),
        intent_id: format!("intent-{}", task_id),
        intent_type: intent_type.to_string(),
        task: Task::new(task_id, assignment_id, data.to_vec()),
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poison| poison.into_inner())
}

// ============================================================================
// Handlers
// ============================================================================

/// Returns the task data unchanged.
pub(crate) struct EchoHandler;

#[async_trait]
impl Handler for EchoHandler {
    async fn execute(&self, task: Task, _ctx: TaskContext) -> anyhow::Result<TaskResult> {
        Ok(TaskResult::success(task.data))
    }
}

/// Always returns `Err(message)`.
pub(crate) struct FailingHandler {
    message: String,
}

impl FailingHandler {
    pub(crate) fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl Handler for FailingHandler {
    async fn execute(&self, _task: Task, _ctx: TaskContext) -> anyhow::Result<TaskResult> {
        Err(anyhow::anyhow!(self.message.clone()))
    }
}

pub(crate) struct PanickingHandler;

#[async_trait]
impl Handler for PanickingHandler {
    async fn execute(&self, _task: Task, _ctx: TaskContext) -> anyhow::Result<TaskResult> {
        panic!("handler exploded");
    }
}

/// Sleeps for `duration`; a cooperative one returns early on cancellation.
pub(crate) struct SleepyHandler {
    duration: Duration,
    cooperative: bool,
    saw_cancellation: AtomicBool,
    started: AtomicUsize,
    finished: AtomicUsize,
}

impl SleepyHandler {
    pub(crate) fn cooperative(duration: Duration) -> Self {
        Self::new(duration, true)
    }

    pub(crate) fn stubborn(duration: Duration) -> Self {
        Self::new(duration, false)
    }

    fn new(duration: Duration, cooperative: bool) -> Self {
        Self {
            duration,
            cooperative,
            saw_cancellation: AtomicBool::new(false),
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        }
    }

    pub(crate) fn saw_cancellation(&self) -> bool {
        self.saw_cancellation.load(Ordering::SeqCst)
    }

    pub(crate) fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub(crate) fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Handler for SleepyHandler {
    async fn execute(&self, task: Task, ctx: TaskContext) -> anyhow::Result<TaskResult> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if self.cooperative {
            tokio::select! {
                _ = tokio::time::sleep(self.duration) => {}
                _ = ctx.cancelled() => {
                    self.saw_cancellation.store(true, Ordering::SeqCst);
                    return Ok(TaskResult::failure("cancelled"));
                }
            }
        } else {
            tokio::time::sleep(self.duration).await;
        }
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(TaskResult::success(task.data))
    }
}

// ============================================================================
// Validator
// ============================================================================

/// Scripted validator.
///
/// Queued outcomes are consumed in order; once a queue is empty every report
/// is accepted. Received payloads are recorded.
#[derive(Default)]
pub(crate) struct FakeValidator {
    single_outcomes: Mutex<VecDeque<Result<SubmitAck>>>,
    batch_outcomes: Mutex<VecDeque<Result<BatchResponse>>>,
    received: Mutex<Vec<SignedExecutionReport>>,
    batches: Mutex<Vec<ExecutionReportBatchRequest>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeValidator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub(crate) fn push_single(&self, outcome: Result<SubmitAck>) {
        lock(&self.single_outcomes).push_back(outcome);
    }

    pub(crate) fn push_batch(&self, outcome: Result<BatchResponse>) {
        lock(&self.batch_outcomes).push_back(outcome);
    }

    pub(crate) fn fail_transport(&self, times: usize) {
        for _ in 0..times {
            self.push_single(Err(AgentError::Transport("connection refused".to_string())));
        }
    }

    pub(crate) fn received(&self) -> Vec<SignedExecutionReport> {
        lock(&self.received).clone()
    }

    pub(crate) fn batches(&self) -> Vec<ExecutionReportBatchRequest> {
        lock(&self.batches).clone()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ValidatorTransport for FakeValidator {
    async fn submit_report(&self, report: &SignedExecutionReport) -> Result<SubmitAck> {
        self.enter().await;
        lock(&self.received).push(report.clone());
        let outcome = lock(&self.single_outcomes).pop_front();
        self.leave();
        outcome.unwrap_or(Ok(SubmitAck {
            accepted: true,
            message: None,
        }))
    }

    async fn submit_batch(&self, request: &ExecutionReportBatchRequest) -> Result<BatchResponse> {
        self.enter().await;
        lock(&self.batches).push(request.clone());
        let outcome = lock(&self.batch_outcomes).pop_front();
        self.leave();
        outcome.unwrap_or(Ok(BatchResponse {
            success_count: request.reports.len(),
            failed_count: 0,
            errors: Vec::new(),
        }))
    }
}

/// A batch response rejecting the given indices of an `n`-report batch.
pub(crate) fn rejecting(n: usize, indices: &[usize]) -> BatchResponse {
    BatchResponse {
        success_count: n - indices.len(),
        failed_count: indices.len(),
        errors: indices
            .iter()
            .map(|&index| BatchItemError {
                index,
                message: "invalid signature".to_string(),
            })
            .collect(),
    }
}

// ============================================================================
// Matcher
// ============================================================================

/// Matcher fake that hands out queued events and records bids.
///
/// With a poll delay, a poll hands out whatever is queued when the delay
/// ends.
#[derive(Default)]
pub(crate) struct FakeMatcher {
    events: Mutex<VecDeque<MatcherEvent>>,
    poll_delay: Option<Duration>,
    polls: AtomicUsize,
    bids: Mutex<Vec<(String, Bid)>>,
    results: Mutex<Vec<TaskResultSubmission>>,
    connects: AtomicUsize,
    closes: AtomicUsize,
}

impl FakeMatcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_poll_delay(delay: Duration) -> Self {
        Self {
            poll_delay: Some(delay),
            ..Self::default()
        }
    }

    pub(crate) fn push_intent(&self, intent: Intent) {
        lock(&self.events).push_back(MatcherEvent::Intent(intent));
    }

    pub(crate) fn push_assignment(&self, assignment: Assignment) {
        lock(&self.events).push_back(MatcherEvent::Assignment(assignment));
    }

    pub(crate) fn bids(&self) -> Vec<(String, Bid)> {
        lock(&self.bids).clone()
    }

    pub(crate) fn results(&self) -> Vec<TaskResultSubmission> {
        lock(&self.results).clone()
    }

    /// Polls started so far.
    pub(crate) fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub(crate) fn pending(&self) -> usize {
        lock(&self.events).len()
    }
}

#[async_trait]
impl MatcherClient for FakeMatcher {
    async fn connect(&self, _registration: &AgentRegistration) -> Result<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn poll(&self) -> Result<Vec<MatcherEvent>> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.poll_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(lock(&self.events).drain(..).collect())
    }

    async fn submit_bid(&self, intent_id: &str, bid: &Bid) -> Result<()> {
        lock(&self.bids).push((intent_id.to_string(), bid.clone()));
        Ok(())
    }

    async fn submit_result(&self, result: &TaskResultSubmission) -> Result<()> {
        lock(&self.results).push(result.clone());
        Ok(())
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
