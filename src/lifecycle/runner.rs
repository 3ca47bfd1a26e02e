//! Per-assignment pipeline.
//!
//! `before_task` → dispatch → `after_task` → result to the matcher → signed
//! report to the validator. Every assignment that reaches a runner ends in
//! exactly one tally bucket.
//!
//! Once the reporting cutoff fires, network calls still pending are
//! abandoned: the report is journaled and counted as unreported.

use super::callbacks::{Callbacks, invoke};
use crate::client::MatcherClient;
use crate::dispatch::TaskDispatcher;
use crate::error::AgentError;
use crate::protocol::{
    Assignment, ExecutionReport, FailureKind, ReportClock, ReportStatus, TaskResult,
    TaskResultSubmission,
};
use crate::submit::ExecutionReportSubmitter;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Where every accepted assignment ended up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownSummary {
    /// Executed and reported (success, failure or timeout).
    pub completed: usize,
    /// Cancelled by shutdown and reported as such.
    pub cancelled: usize,
    /// Refused because the work queue was full.
    pub rejected: usize,
    /// The report could not be delivered (journaled when a journal is set).
    pub unreported: usize,
}

impl ShutdownSummary {
    pub fn total(&self) -> usize {
        self.completed + self.cancelled + self.rejected + self.unreported
    }
}

#[derive(Debug, Default)]
struct Tally {
    completed: AtomicUsize,
    cancelled: AtomicUsize,
    rejected: AtomicUsize,
    unreported: AtomicUsize,
}

pub(crate) struct TaskRunner {
    agent_id: String,
    dispatcher: TaskDispatcher,
    matcher: Arc<dyn MatcherClient>,
    submitter: Arc<ExecutionReportSubmitter>,
    callbacks: Arc<dyn Callbacks>,
    clock: ReportClock,
    tally: Tally,
    cutoff: CancellationToken,
}

impl TaskRunner {
    pub(crate) fn new(
        agent_id: String,
        dispatcher: TaskDispatcher,
        matcher: Arc<dyn MatcherClient>,
        submitter: Arc<ExecutionReportSubmitter>,
        callbacks: Arc<dyn Callbacks>,
    ) -> Self {
        Self {
            agent_id,
            dispatcher,
            matcher,
            submitter,
            callbacks,
            clock: ReportClock::new(),
            tally: Tally::default(),
            cutoff: CancellationToken::new(),
        }
    }

    /// Execute an assignment and report its outcome.
    pub(crate) async fn run(&self, assignment: Assignment, cancel: &CancellationToken) {
        let subject = assignment.assignment_id.as_str();
        invoke("before_task", subject, || {
            self.callbacks.before_task(&assignment)
        });

        let result = self.dispatcher.execute(&assignment, cancel).await;

        invoke("after_task", subject, || {
            self.callbacks.after_task(&assignment, &result)
        });

        let status = result.status();
        self.finish(&assignment, &result, status).await;
    }

    /// Refuse an assignment the pool had no room for.
    pub(crate) async fn reject(&self, assignment: Assignment) {
        warn!(
            assignment_id = %assignment.assignment_id,
            task_id = %assignment.task.id,
            "work queue full; rejecting assignment"
        );
        let result = TaskResult::failure(format!(
            "agent '{}' is at capacity; assignment rejected",
            self.agent_id
        ));
        self.finish(&assignment, &result, ReportStatus::Rejected).await;
    }

    /// Account for a queued assignment that shutdown prevented from running.
    pub(crate) async fn cancel_queued(&self, assignment: Assignment) {
        let result = TaskResult::fault(
            FailureKind::Cancelled,
            format!(
                "task '{}' was cancelled by agent shutdown before it started",
                assignment.task.id
            ),
        );
        self.finish(&assignment, &result, ReportStatus::Cancelled).await;
    }

    /// Stop waiting on the matcher and validator for any report from now on.
    pub(crate) fn cut_off(&self) {
        self.cutoff.cancel();
    }

    pub(crate) fn summary(&self) -> ShutdownSummary {
        ShutdownSummary {
            completed: self.tally.completed.load(Ordering::SeqCst),
            cancelled: self.tally.cancelled.load(Ordering::SeqCst),
            rejected: self.tally.rejected.load(Ordering::SeqCst),
            unreported: self.tally.unreported.load(Ordering::SeqCst),
        }
    }

    async fn finish(&self, assignment: &Assignment, result: &TaskResult, status: ReportStatus) {
        let returned = TaskResultSubmission::new(&self.agent_id, assignment, result);
        let sent = tokio::select! {
            biased;
            sent = self.matcher.submit_result(&returned) => sent,
            _ = self.cutoff.cancelled() => Err(AgentError::Transport(
                "result submission abandoned at shutdown".to_string(),
            )),
        };
        if let Err(e) = sent {
            warn!(
                assignment_id = %assignment.assignment_id,
                error = %e,
                "could not return task result to matcher"
            );
        }

        let report =
            ExecutionReport::for_assignment(assignment, &self.agent_id, status, self.clock.now());
        let delivered = self.submitter.submit_single_until(report, &self.cutoff).await;
        let bucket = match delivered {
            Ok(_) => {
                debug!(
                    assignment_id = %assignment.assignment_id,
                    %status,
                    "execution report accepted"
                );
                match status {
                    ReportStatus::Cancelled => &self.tally.cancelled,
                    ReportStatus::Rejected => &self.tally.rejected,
                    _ => &self.tally.completed,
                }
            }
            Err(e) => {
                error!(
                    assignment_id = %assignment.assignment_id,
                    %status,
                    error = %e,
                    "execution report not delivered"
                );
                &self.tally.unreported
            }
        };
        bucket.fetch_add(1, Ordering::SeqCst);
    }
}
