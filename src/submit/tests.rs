//! Tests for report submission.

use super::*;
use crate::client::HttpValidatorClient;
use crate::protocol::ReportStatus;
use crate::signing::verify;
use crate::test_support::{FakeValidator, rejecting, signing_context};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn report(assignment_id: &str) -> ExecutionReport {
    ExecutionReport {
        assignment_id: assignment_id.to_string(),
        intent_id: "intent-123".to_string(),
        agent_id: "agent-1".to_string(),
        status: ReportStatus::Success,
        timestamp: 1_700_000_000,
    }
}

fn malformed(assignment_id: &str) -> ExecutionReport {
    ExecutionReport {
        agent_id: String::new(),
        ..report(assignment_id)
    }
}

fn fast_retry(attempts: u32) -> RetryPolicy {
    RetryPolicy::new(attempts, Duration::from_millis(1), Duration::from_millis(2))
}

fn submitter(validator: &Arc<FakeValidator>) -> ExecutionReportSubmitter {
    ExecutionReportSubmitter::new(validator.clone(), signing_context(), fast_retry(3))
}

// ============================================================================
// Single
// ============================================================================

#[tokio::test]
async fn test_submit_single_sends_verifiable_signature() {
    let validator = Arc::new(FakeValidator::new());
    let ack = submitter(&validator).submit_single(report("a1")).await.unwrap();

    assert!(ack.accepted);
    let received = validator.received();
    assert_eq!(received.len(), 1);
    assert!(verify(&received[0]).unwrap());
}

#[tokio::test]
async fn test_retries_send_identical_payload() {
    let validator = Arc::new(FakeValidator::new());
    validator.fail_transport(2);

    submitter(&validator).submit_single(report("a1")).await.unwrap();

    let received = validator.received();
    assert_eq!(received.len(), 3);
    assert_eq!(received[0], received[1]);
    assert_eq!(received[1], received[2]);
}

#[tokio::test]
async fn test_validation_failure_is_not_retried() {
    let validator = Arc::new(FakeValidator::new());
    validator.push_single(Err(AgentError::Validation("bad signature".to_string())));

    let err = submitter(&validator).submit_single(report("a1")).await.unwrap_err();

    assert!(matches!(err, AgentError::Validation(_)));
    assert_eq!(validator.received().len(), 1);
}

#[tokio::test]
async fn test_not_accepted_ack_is_validation_error() {
    let validator = Arc::new(FakeValidator::new());
    validator.push_single(Ok(SubmitAck {
        accepted: false,
        message: Some("unknown assignment".to_string()),
    }));

    let err = submitter(&validator).submit_single(report("a1")).await.unwrap_err();
    assert!(matches!(err, AgentError::Validation(_)));
    assert!(err.to_string().contains("unknown assignment"));
}

#[tokio::test]
async fn test_malformed_report_never_sent() {
    let validator = Arc::new(FakeValidator::new());
    let err = submitter(&validator).submit_single(malformed("a1")).await.unwrap_err();

    assert!(err.to_string().contains("agent_id must not be empty"));
    assert!(validator.received().is_empty());
}

#[tokio::test]
async fn test_resubmission_is_idempotent_at_validator() {
    let validator = Arc::new(FakeValidator::new());
    let s = submitter(&validator);

    let first = s.submit_single(report("a1")).await.unwrap();
    let second = s.submit_single(report("a1")).await.unwrap();

    assert_eq!(first, second);
    // No client-side deduplication: both reached the validator.
    assert_eq!(validator.received().len(), 2);
}

#[tokio::test]
async fn test_exhausted_retries_are_journaled() {
    let dir = TempDir::new().unwrap();
    let journal = UndeliveredJournal::new(dir.path().join("undelivered.ndjson"));
    let validator = Arc::new(FakeValidator::new());
    validator.fail_transport(3);

    let s = submitter(&validator).with_journal(journal.clone());
    let err = s.submit_single(report("a1")).await.unwrap_err();
    assert!(err.is_transient());

    let entries = journal.read().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].report, validator.received()[0]);
    assert!(entries[0].reason.contains("after 3 attempt(s)"));
}

#[tokio::test]
async fn test_cutoff_abandons_hanging_delivery_into_journal() {
    let dir = TempDir::new().unwrap();
    let journal = UndeliveredJournal::new(dir.path().join("undelivered.ndjson"));
    let validator = Arc::new(FakeValidator::with_delay(Duration::from_secs(3600)));
    let s = submitter(&validator).with_journal(journal.clone());

    let cutoff = CancellationToken::new();
    let trigger = cutoff.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        s.submit_single_until(report("a1"), &cutoff),
    )
    .await
    .expect("cutoff must end the delivery")
    .unwrap_err();

    assert!(err.is_transient());
    assert!(err.to_string().contains("abandoned at shutdown"));
    let entries = journal.read().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].report.report.assignment_id, "a1");
}

#[tokio::test]
async fn test_ready_validator_wins_over_fired_cutoff() {
    let validator = Arc::new(FakeValidator::new());
    let s = submitter(&validator);
    let cutoff = CancellationToken::new();
    cutoff.cancel();

    let ack = s.submit_single_until(report("a1"), &cutoff).await.unwrap();
    assert!(ack.accepted);
    assert_eq!(validator.received().len(), 1);
}

#[tokio::test]
async fn test_transmissions_are_serialized() {
    let validator = Arc::new(FakeValidator::with_delay(Duration::from_millis(5)));
    let s = Arc::new(submitter(&validator));

    let mut handles = Vec::new();
    for i in 0..8 {
        let s = s.clone();
        handles.push(tokio::spawn(async move {
            s.submit_single(report(&format!("a{}", i))).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(validator.received().len(), 8);
    assert_eq!(validator.max_in_flight(), 1);
}

// ============================================================================
// Batch
// ============================================================================

#[tokio::test]
async fn test_partial_ok_reports_per_item_failure() {
    let validator = Arc::new(FakeValidator::new());
    validator.push_batch(Ok(rejecting(2, &[1])));

    let response = submitter(&validator)
        .submit_batch(vec![report("r1"), report("r2")], true)
        .await
        .unwrap();

    assert_eq!(response.success_count, 1);
    assert_eq!(response.failed_count, 1);
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].index, 1);
    assert!(validator.batches()[0].partial_ok);
}

#[tokio::test]
async fn test_partial_ok_remaps_indices_around_local_failures() {
    let validator = Arc::new(FakeValidator::new());
    // Sent subset is [r0, r2, r3]; the validator rejects its index 1 (r2).
    validator.push_batch(Ok(rejecting(3, &[1])));

    let response = submitter(&validator)
        .submit_batch(
            vec![report("r0"), malformed("r1"), report("r2"), report("r3")],
            true,
        )
        .await
        .unwrap();

    assert_eq!(validator.batches()[0].reports.len(), 3);
    assert_eq!(response.success_count, 2);
    assert_eq!(response.failed_count, 2);
    assert_eq!(response.total(), 4);
    let indices: Vec<usize> = response.errors.iter().map(|e| e.index).collect();
    assert_eq!(indices, vec![1, 2]);
}

#[tokio::test]
async fn test_all_or_nothing_with_malformed_report_sends_nothing() {
    let validator = Arc::new(FakeValidator::new());

    let response = submitter(&validator)
        .submit_batch(vec![report("r0"), malformed("r1"), report("r2")], false)
        .await
        .unwrap();

    assert_eq!(response.success_count, 0);
    assert_eq!(response.failed_count, 3);
    assert_eq!(response.errors[0].index, 1);
    assert!(validator.batches().is_empty());
}

#[tokio::test]
async fn test_all_or_nothing_never_reports_mixed_outcome() {
    let validator = Arc::new(FakeValidator::new());
    validator.push_batch(Ok(rejecting(3, &[2])));

    let response = submitter(&validator)
        .submit_batch(vec![report("r0"), report("r1"), report("r2")], false)
        .await
        .unwrap();

    assert_eq!(response.success_count, 0);
    assert_eq!(response.failed_count, 3);
    assert!(!validator.batches()[0].partial_ok);
}

#[tokio::test]
async fn test_all_or_nothing_success() {
    let validator = Arc::new(FakeValidator::new());
    let response = submitter(&validator)
        .submit_batch(vec![report("r0"), report("r1")], false)
        .await
        .unwrap();

    assert_eq!(response.success_count, 2);
    assert_eq!(response.failed_count, 0);
}

#[tokio::test]
async fn test_inconsistent_counts_are_normalized() {
    let validator = Arc::new(FakeValidator::new());
    validator.push_batch(Ok(BatchResponse {
        success_count: 1,
        failed_count: 0,
        errors: vec![BatchItemError {
            index: 7,
            message: "out of range".to_string(),
        }],
    }));

    let response = submitter(&validator)
        .submit_batch(vec![report("r0"), report("r1"), report("r2")], true)
        .await
        .unwrap();

    assert_eq!(response.total(), 3);
    assert_eq!(response.success_count, 1);
    assert!(response.errors.is_empty());
}

#[tokio::test]
async fn test_batch_level_rejection_is_error() {
    let validator = Arc::new(FakeValidator::new());
    validator.push_batch(Err(AgentError::Validation("batch too large".to_string())));

    let err = submitter(&validator)
        .submit_batch(vec![report("r0")], true)
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::Validation(_)));
    assert_eq!(validator.batches().len(), 1);
}

#[tokio::test]
async fn test_empty_batch_is_noop() {
    let validator = Arc::new(FakeValidator::new());
    let response = submitter(&validator).submit_batch(Vec::new(), true).await.unwrap();
    assert_eq!(response, BatchResponse::default());
    assert!(validator.batches().is_empty());
}

// ============================================================================
// Journal replay
// ============================================================================

#[tokio::test]
async fn test_resubmit_journal_keeps_only_undelivered() {
    let dir = TempDir::new().unwrap();
    let journal = UndeliveredJournal::new(dir.path().join("undelivered.ndjson"));
    let signing = signing_context();
    for id in ["a1", "a2", "a3"] {
        let signed = signing.sign_report(report(id)).unwrap();
        journal.append(&JournalEntry::new(signed, "connection refused")).unwrap();
    }

    let validator = Arc::new(FakeValidator::new());
    // a1 delivered, a2 rejected, a3 still unreachable on every attempt.
    validator.push_single(Ok(SubmitAck {
        accepted: true,
        message: None,
    }));
    validator.push_single(Err(AgentError::Validation("stale".to_string())));
    validator.fail_transport(3);

    let s = ExecutionReportSubmitter::new(validator.clone(), signing, fast_retry(3))
        .with_journal(journal.clone());
    let summary = s.resubmit_journal().await.unwrap();

    assert_eq!(
        summary,
        ResubmitSummary {
            delivered: 1,
            rejected: 1,
            remaining: 1
        }
    );
    let left = journal.read().unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].report.report.assignment_id, "a3");
}

#[tokio::test]
async fn test_resubmit_without_journal_is_configuration_error() {
    let validator = Arc::new(FakeValidator::new());
    let err = submitter(&validator).resubmit_journal().await.unwrap_err();
    assert!(matches!(err, AgentError::Configuration(_)));
}

// ============================================================================
// Over HTTP
// ============================================================================

#[tokio::test]
async fn test_http_bad_signature_scenario() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/execution-reports/batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": 1,
            "failed": 1,
            "errors": [{"index": 1, "message": "invalid signature"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let transport =
        Arc::new(HttpValidatorClient::new(server.uri(), Duration::from_secs(5)).unwrap());
    let s = ExecutionReportSubmitter::new(transport, signing_context(), fast_retry(3));

    let response = s
        .submit_batch(vec![report("r1"), report("r2")], true)
        .await
        .unwrap();

    assert_eq!(response.success_count, 1);
    assert_eq!(response.failed_count, 1);
    assert_eq!(response.errors[0].index, 1);
    assert!(response.errors[0].message.contains("signature"));
}

#[tokio::test]
async fn test_http_server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/execution-reports"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/execution-reports"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"accepted": true})),
        )
        .mount(&server)
        .await;

    let transport =
        Arc::new(HttpValidatorClient::new(server.uri(), Duration::from_secs(5)).unwrap());
    let s = ExecutionReportSubmitter::new(transport, signing_context(), fast_retry(5));

    let ack = s.submit_single(report("a1")).await.unwrap();
    assert!(ack.accepted);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}
