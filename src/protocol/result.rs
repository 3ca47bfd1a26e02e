//! Task results and the versioned payload envelope.

use super::report::ReportStatus;
use crate::error::{AgentError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Message used when a handler reports failure without saying why.
const UNSPECIFIED_FAILURE: &str = "handler reported failure without an error message";

/// Why a task did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The handler returned an error or an unsuccessful result.
    Handler,
    /// The handler panicked.
    Panicked,
    /// The per-task deadline elapsed.
    DeadlineExceeded,
    /// The agent is shutting down and the task was cancelled.
    Cancelled,
    /// No handler is registered for the intent type.
    Unroutable,
}

/// The outcome of executing one task.
///
/// A failed result always carries a non-empty error message; the
/// constructors enforce this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    data: Vec<u8>,
    success: bool,
    error: Option<String>,
    failure: Option<FailureKind>,
}

impl TaskResult {
    /// A successful result carrying `data`.
    pub fn success(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            success: true,
            error: None,
            failure: None,
        }
    }

    /// A failed result reported by a handler.
    pub fn failure(error: impl Into<String>) -> Self {
        Self::fault(FailureKind::Handler, error)
    }

    /// A failed result that still carries partial output.
    pub fn failure_with_data(data: impl Into<Vec<u8>>, error: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Self::failure(error)
        }
    }

    pub(crate) fn fault(kind: FailureKind, error: impl Into<String>) -> Self {
        let error = error.into();
        let error = if error.trim().is_empty() {
            UNSPECIFIED_FAILURE.to_string()
        } else {
            error
        };
        Self {
            data: Vec::new(),
            success: false,
            error: Some(error),
            failure: Some(kind),
        }
    }

    /// Serialize a domain value into a versioned envelope and wrap it as a
    /// successful result.
    pub fn from_envelope<T: Serialize>(kind: &str, version: u32, body: &T) -> Result<Self> {
        let envelope = ResultEnvelope {
            version,
            kind: kind.to_string(),
            body,
        };
        let bytes = serde_json::to_vec(&envelope).map_err(|e| {
            AgentError::TaskExecution(format!("failed to serialize '{}' result: {}", kind, e))
        })?;
        Ok(Self::success(bytes))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure
    }

    /// Report status derived from this result.
    pub fn status(&self) -> ReportStatus {
        match self.failure {
            None => ReportStatus::Success,
            Some(FailureKind::DeadlineExceeded) => ReportStatus::Timeout,
            Some(FailureKind::Cancelled) => ReportStatus::Cancelled,
            Some(_) => ReportStatus::Failure,
        }
    }

    /// Restore the invariant for results built by hand in handler code.
    pub(crate) fn normalized(mut self) -> Self {
        if self.success {
            self.error = None;
            self.failure = None;
        } else {
            if self.error.as_deref().is_none_or(|e| e.trim().is_empty()) {
                self.error = Some(UNSPECIFIED_FAILURE.to_string());
            }
            if self.failure.is_none() {
                self.failure = Some(FailureKind::Handler);
            }
        }
        self
    }
}

/// Versioned serialization contract for domain result payloads.
///
/// Handlers wrap their output in an envelope so consumers can check the
/// `kind` and `version` before decoding `body`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope<T> {
    pub version: u32,
    pub kind: String,
    pub body: T,
}

impl<T: DeserializeOwned> ResultEnvelope<T> {
    /// Decode an envelope, requiring the expected kind and version.
    pub fn decode(bytes: &[u8], kind: &str, version: u32) -> Result<Self> {
        let envelope: ResultEnvelope<T> = serde_json::from_slice(bytes).map_err(|e| {
            AgentError::Validation(format!("malformed '{}' result payload: {}", kind, e))
        })?;
        if envelope.kind != kind {
            return Err(AgentError::Validation(format!(
                "expected result kind '{}', found '{}'",
                kind, envelope.kind
            )));
        }
        if envelope.version != version {
            return Err(AgentError::Validation(format!(
                "unsupported '{}' result version {} (expected {})",
                kind, envelope.version, version
            )));
        }
        Ok(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failure_always_has_message() {
        let result = TaskResult::failure("");
        assert!(!result.is_success());
        assert_eq!(result.error(), Some(UNSPECIFIED_FAILURE));
        assert_eq!(result.failure_kind(), Some(FailureKind::Handler));
    }

    #[test]
    fn success_has_no_error() {
        let result = TaskResult::success(b"ok".to_vec());
        assert!(result.is_success());
        assert_eq!(result.error(), None);
        assert_eq!(result.status(), ReportStatus::Success);
    }

    #[test]
    fn status_follows_failure_kind() {
        assert_eq!(
            TaskResult::fault(FailureKind::DeadlineExceeded, "late").status(),
            ReportStatus::Timeout
        );
        assert_eq!(
            TaskResult::fault(FailureKind::Cancelled, "stop").status(),
            ReportStatus::Cancelled
        );
        assert_eq!(
            TaskResult::fault(FailureKind::Panicked, "boom").status(),
            ReportStatus::Failure
        );
    }

    #[test]
    fn failure_with_data_keeps_partial_output() {
        let result = TaskResult::failure_with_data(b"partial".to_vec(), "cut short");
        assert_eq!(result.data(), b"partial");
        assert_eq!(result.error(), Some("cut short"));
    }

    #[test]
    fn normalized_fills_missing_failure_details() {
        let raw = TaskResult {
            data: Vec::new(),
            success: false,
            error: Some("   ".to_string()),
            failure: None,
        };
        let fixed = raw.normalized();
        assert_eq!(fixed.error(), Some(UNSPECIFIED_FAILURE));
        assert_eq!(fixed.failure_kind(), Some(FailureKind::Handler));
    }

    #[test]
    fn envelope_round_trip_checks_kind_and_version() {
        let result = TaskResult::from_envelope("meal-plan", 2, &json!({"meals": 3})).unwrap();

        let decoded =
            ResultEnvelope::<serde_json::Value>::decode(result.data(), "meal-plan", 2).unwrap();
        assert_eq!(decoded.body["meals"], 3);

        let wrong_kind =
            ResultEnvelope::<serde_json::Value>::decode(result.data(), "tax-plan", 2).unwrap_err();
        assert!(wrong_kind.to_string().contains("expected result kind"));

        let wrong_version =
            ResultEnvelope::<serde_json::Value>::decode(result.data(), "meal-plan", 1).unwrap_err();
        assert!(wrong_version.to_string().contains("unsupported"));
    }
}
