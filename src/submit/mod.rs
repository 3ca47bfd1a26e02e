//! Execution report submission.
//!
//! `ExecutionReportSubmitter` turns reports into signed payloads and delivers
//! them to the validator:
//!
//! - a report is signed once; every retry sends the identical payload
//! - transport failures are retried with exponential backoff, validation
//!   failures are returned immediately
//! - transmissions over the shared transport are serialized
//! - reports still undelivered after the last retry go to the journal
//! - a delivery raced against a cutoff token is abandoned when it fires and
//!   the report goes to the journal
//!
//! # Batch Semantics
//!
//! With `partial_ok = false` the batch is all-or-nothing: any malformed report
//! fails the whole batch before anything is sent, and a validator response
//! that rejects any item is reported as every item failed.
//!
//! With `partial_ok = true` malformed reports are failed locally, the rest are
//! sent, and the response lists one error per failing index of the caller's
//! list. `success + failed` always equals the number of reports.
//!
//! No deduplication happens here; the validator treats `assignment_id` as the
//! idempotency key.

mod journal;
mod retry;

pub use journal::{JournalEntry, UndeliveredJournal};
pub use retry::RetryPolicy;

use crate::client::ValidatorTransport;
use crate::error::{AgentError, Result};
use crate::protocol::{
    BatchItemError, BatchResponse, ExecutionReport, ExecutionReportBatchRequest,
    SignedExecutionReport, SubmitAck,
};
use crate::signing::SigningContext;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Outcome of replaying the undelivered journal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResubmitSummary {
    pub delivered: usize,
    pub rejected: usize,
    pub remaining: usize,
}

pub struct ExecutionReportSubmitter {
    transport: Arc<dyn ValidatorTransport>,
    signing: SigningContext,
    retry: RetryPolicy,
    journal: Option<UndeliveredJournal>,
    wire: Mutex<()>,
}

impl ExecutionReportSubmitter {
    pub fn new(
        transport: Arc<dyn ValidatorTransport>,
        signing: SigningContext,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            signing,
            retry,
            journal: None,
            wire: Mutex::new(()),
        }
    }

    pub fn with_journal(mut self, journal: UndeliveredJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn journal(&self) -> Option<&UndeliveredJournal> {
        self.journal.as_ref()
    }

    pub fn transport(&self) -> &Arc<dyn ValidatorTransport> {
        &self.transport
    }

    /// Validate, sign and deliver one report.
    pub async fn submit_single(&self, report: ExecutionReport) -> Result<SubmitAck> {
        report.validate().map_err(|msg| {
            AgentError::Validation(format!("malformed execution report: {}", msg))
        })?;
        let signed = self.signing.sign_report(report)?;
        self.deliver(&signed, true, None).await
    }

    /// Like `submit_single`, but gives up as soon as `cutoff` fires. An
    /// abandoned report is journaled and returned as a transport error.
    pub async fn submit_single_until(
        &self,
        report: ExecutionReport,
        cutoff: &CancellationToken,
    ) -> Result<SubmitAck> {
        report.validate().map_err(|msg| {
            AgentError::Validation(format!("malformed execution report: {}", msg))
        })?;
        let signed = self.signing.sign_report(report)?;
        self.deliver(&signed, true, Some(cutoff)).await
    }

    /// Validate, sign and deliver a batch of reports.
    pub async fn submit_batch(
        &self,
        reports: Vec<ExecutionReport>,
        partial_ok: bool,
    ) -> Result<BatchResponse> {
        let total = reports.len();
        if total == 0 {
            return Ok(BatchResponse::default());
        }

        let mut local_errors = Vec::new();
        let mut signed = Vec::with_capacity(total);
        // Position in the request -> index in the caller's list.
        let mut origin = Vec::with_capacity(total);

        for (index, report) in reports.into_iter().enumerate() {
            let prepared = report
                .validate()
                .map_err(|msg| {
                    AgentError::Validation(format!("malformed execution report: {}", msg))
                })
                .and_then(|_| self.signing.sign_report(report));
            match prepared {
                Ok(report) => {
                    origin.push(index);
                    signed.push(report);
                }
                Err(e) => local_errors.push(BatchItemError {
                    index,
                    message: e.to_string(),
                }),
            }
        }

        if !local_errors.is_empty() && (!partial_ok || signed.is_empty()) {
            warn!(
                total,
                malformed = local_errors.len(),
                partial_ok,
                "batch not sent: malformed reports"
            );
            return Ok(BatchResponse::all_failed(total, local_errors));
        }

        let request = ExecutionReportBatchRequest {
            reports: signed,
            partial_ok,
        };
        let this = self;
        let sent = &request;
        let outcome = self
            .retry
            .run("execution report batch", move || async move {
                let _wire = this.wire.lock().await;
                this.transport.submit_batch(sent).await
            })
            .await;

        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                if e.is_transient() {
                    warn!(total, error = %e, "batch delivery exhausted retries");
                    for report in &request.reports {
                        self.journal_undelivered(report, &e).await;
                    }
                }
                return Err(e);
            }
        };

        let response = reconcile(total, &origin, local_errors, response, partial_ok);
        info!(
            success = response.success_count,
            failed = response.failed_count,
            partial_ok,
            "batch submitted"
        );
        Ok(response)
    }

    /// Replay every journaled report; keep the ones that still cannot be
    /// delivered.
    pub async fn resubmit_journal(&self) -> Result<ResubmitSummary> {
        let Some(journal) = &self.journal else {
            return Err(AgentError::Configuration(
                "no undelivered journal configured (runtime.undelivered_journal)".to_string(),
            ));
        };

        let entries = journal.blocking(|j| j.read()).await?;
        let mut summary = ResubmitSummary::default();
        let mut remaining = Vec::new();

        for mut entry in entries {
            let assignment_id = entry.report.report.assignment_id.clone();
            match self.deliver(&entry.report, false, None).await {
                Ok(_) => {
                    info!(assignment_id, "journaled report delivered");
                    summary.delivered += 1;
                }
                Err(e) if e.is_transient() => {
                    entry.reason = e.to_string();
                    remaining.push(entry);
                }
                Err(e) => {
                    warn!(assignment_id, error = %e, "journaled report rejected; dropping");
                    summary.rejected += 1;
                }
            }
        }

        summary.remaining = remaining.len();
        journal.blocking(move |j| j.rewrite(&remaining)).await?;
        Ok(summary)
    }

    async fn deliver(
        &self,
        signed: &SignedExecutionReport,
        journal: bool,
        cutoff: Option<&CancellationToken>,
    ) -> Result<SubmitAck> {
        let assignment_id = signed.report.assignment_id.as_str();
        let this = self;
        let attempts = self
            .retry
            .run("execution report", move || async move {
                let _wire = this.wire.lock().await;
                this.transport.submit_report(signed).await
            });

        let outcome = match cutoff {
            None => attempts.await,
            Some(cutoff) => tokio::select! {
                biased;
                outcome = attempts => outcome,
                _ = cutoff.cancelled() => Err(AgentError::Transport(format!(
                    "delivery of report for assignment '{}' abandoned at shutdown",
                    assignment_id
                ))),
            },
        };

        match outcome {
            Ok(ack) if ack.accepted => {
                info!(assignment_id, status = %signed.report.status, "report accepted");
                Ok(ack)
            }
            Ok(ack) => Err(AgentError::Validation(format!(
                "validator rejected report for assignment '{}': {}",
                assignment_id,
                ack.message.as_deref().unwrap_or("no reason given")
            ))),
            Err(e) => {
                if journal && e.is_transient() {
                    warn!(assignment_id, error = %e, "report delivery exhausted retries");
                    self.journal_undelivered(signed, &e).await;
                }
                Err(e)
            }
        }
    }

    async fn journal_undelivered(&self, report: &SignedExecutionReport, cause: &AgentError) {
        let Some(journal) = &self.journal else {
            return;
        };
        let entry = JournalEntry::new(report.clone(), cause.to_string());
        if let Err(e) = journal.blocking(move |j| j.append(&entry)).await {
            error!(
                assignment_id = %report.report.assignment_id,
                error = %e,
                "failed to journal undelivered report; it is lost"
            );
        }
    }
}

/// Map the validator's answer for the sent subset back onto the caller's list.
fn reconcile(
    total: usize,
    origin: &[usize],
    local_errors: Vec<BatchItemError>,
    response: BatchResponse,
    partial_ok: bool,
) -> BatchResponse {
    let sent = origin.len();

    let mut errors: BTreeMap<usize, String> = local_errors
        .into_iter()
        .map(|e| (e.index, e.message))
        .collect();
    let mut remote_failed = 0;
    for item in response.errors {
        match origin.get(item.index) {
            Some(&index) => {
                if errors.insert(index, item.message).is_none() {
                    remote_failed += 1;
                }
            }
            None => warn!(
                index = item.index,
                sent,
                "validator reported an out-of-range batch index"
            ),
        }
    }

    // Trust the larger failure count, but never more than were sent.
    let remote_failed = remote_failed.max(response.failed_count).min(sent);
    let remote_success = response.success_count.min(sent - remote_failed);
    if remote_success + remote_failed != sent {
        warn!(
            sent,
            success = response.success_count,
            failed = response.failed_count,
            "validator counts do not cover the batch; unaccounted reports counted as failed"
        );
    }

    let errors: Vec<BatchItemError> = errors
        .into_iter()
        .map(|(index, message)| BatchItemError { index, message })
        .collect();

    if !partial_ok {
        if remote_success == sent {
            return BatchResponse {
                success_count: total,
                failed_count: 0,
                errors: Vec::new(),
            };
        }
        warn!(
            sent,
            accepted = remote_success,
            "all-or-nothing batch partially rejected; treating every report as failed"
        );
        return BatchResponse::all_failed(total, errors);
    }

    BatchResponse {
        success_count: remote_success,
        failed_count: total - remote_success,
        errors,
    }
}

#[cfg(test)]
mod tests;
