//! HTTP validator transport.

use super::ValidatorTransport;
use super::http::{build_client, endpoint, read_json, send_error};
use crate::error::Result;
use crate::protocol::{
    BatchResponse, ExecutionReportBatchRequest, SignedExecutionReport, SubmitAck,
};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Posts signed reports to `/v1/execution-reports` and
/// `/v1/execution-reports/batch`.
pub struct HttpValidatorClient {
    base_url: String,
    http: Client,
}

impl HttpValidatorClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into(),
            http: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl ValidatorTransport for HttpValidatorClient {
    async fn submit_report(&self, report: &SignedExecutionReport) -> Result<SubmitAck> {
        let url = endpoint(&self.base_url, &["v1", "execution-reports"])?;
        debug!(assignment_id = %report.report.assignment_id, "posting execution report");

        let response = self
            .http
            .post(url)
            .json(report)
            .send()
            .await
            .map_err(|e| send_error("execution report", e))?;
        read_json("execution report", response).await
    }

    async fn submit_batch(&self, request: &ExecutionReportBatchRequest) -> Result<BatchResponse> {
        let url = endpoint(&self.base_url, &["v1", "execution-reports", "batch"])?;
        debug!(
            reports = request.reports.len(),
            partial_ok = request.partial_ok,
            "posting execution report batch"
        );

        let response = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| send_error("execution report batch", e))?;
        read_json("execution report batch", response).await
    }
}
