//! HTTP matcher client.
//!
//! - `POST /v1/agents/register` - announce the agent profile
//! - `GET  /v1/agents/{agent_id}/events` - drain pending intents/assignments
//! - `POST /v1/intents/{intent_id}/bids` - place a bid
//! - `POST /v1/assignments/{assignment_id}/result` - return a task result

use super::MatcherClient;
use super::http::{build_client, check_status, endpoint, read_json, send_error};
use crate::error::Result;
use crate::protocol::{AgentRegistration, Bid, BidSubmission, MatcherEvent, TaskResultSubmission};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    events: Vec<MatcherEvent>,
}

pub struct HttpMatcherClient {
    base_url: String,
    agent_id: String,
    http: Client,
}

impl HttpMatcherClient {
    pub fn new(
        base_url: impl Into<String>,
        agent_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into(),
            agent_id: agent_id.into(),
            http: build_client(timeout)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl MatcherClient for HttpMatcherClient {
    async fn connect(&self, registration: &AgentRegistration) -> Result<()> {
        let url = endpoint(&self.base_url, &["v1", "agents", "register"])?;
        let response = self
            .http
            .post(url)
            .json(registration)
            .send()
            .await
            .map_err(|e| send_error("matcher registration", e))?;
        check_status("matcher registration", response).await?;

        info!(
            matcher = %self.base_url,
            agent_id = %registration.agent_id,
            capabilities = ?registration.capabilities,
            "registered with matcher"
        );
        Ok(())
    }

    async fn poll(&self) -> Result<Vec<MatcherEvent>> {
        let url = endpoint(&self.base_url, &["v1", "agents", &self.agent_id, "events"])?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| send_error("matcher poll", e))?;
        let body: EventsResponse = read_json("matcher poll", response).await?;
        Ok(body.events)
    }

    async fn submit_bid(&self, intent_id: &str, bid: &Bid) -> Result<()> {
        let url = endpoint(&self.base_url, &["v1", "intents", intent_id, "bids"])?;
        let submission = BidSubmission {
            agent_id: self.agent_id.clone(),
            intent_id: intent_id.to_string(),
            bid: bid.clone(),
        };
        let response = self
            .http
            .post(url)
            .json(&submission)
            .send()
            .await
            .map_err(|e| send_error("bid submission", e))?;
        check_status("bid submission", response).await?;

        debug!(intent_id, price = bid.price, currency = %bid.currency, "bid placed");
        Ok(())
    }

    async fn submit_result(&self, result: &TaskResultSubmission) -> Result<()> {
        let url = endpoint(
            &self.base_url,
            &["v1", "assignments", &result.assignment_id, "result"],
        )?;
        let response = self
            .http
            .post(url)
            .json(result)
            .send()
            .await
            .map_err(|e| send_error("result submission", e))?;
        check_status("result submission", response).await?;
        Ok(())
    }

    async fn close(&self) {
        debug!(matcher = %self.base_url, "matcher client closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn registration() -> AgentRegistration {
        AgentRegistration {
            agent_id: "agent-1".to_string(),
            subnet_id: format!("0x{}", "ab".repeat(32)),
            chain_address: None,
            capabilities: vec!["news-analyser".to_string()],
            intent_types: vec![],
            public_key: "02aa".to_string(),
        }
    }

    async fn client(server: &MockServer) -> HttpMatcherClient {
        HttpMatcherClient::new(server.uri(), "agent-1", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_connect_posts_registration() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/agents/register"))
            .and(body_partial_json(serde_json::json!({
                "agent_id": "agent-1",
                "capabilities": ["news-analyser"]
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).await.connect(&registration()).await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_rejected_is_validation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/agents/register"))
            .respond_with(ResponseTemplate::new(403).set_body_string("unknown subnet"))
            .mount(&server)
            .await;

        let err = client(&server).await.connect(&registration()).await.unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));
        assert!(err.to_string().contains("unknown subnet"));
    }

    #[tokio::test]
    async fn test_poll_decodes_events() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/agents/agent-1/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "events": [
                    {"kind": "intent", "id": "i1", "type": "news-analyser"},
                    {"kind": "assignment", "assignment_id": "a1", "intent_id": "i1",
                     "intent_type": "news-analyser",
                     "task": {"id": "t1", "assignment_id": "a1", "data": ""}}
                ]
            })))
            .mount(&server)
            .await;

        let events = client(&server).await.poll().await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], MatcherEvent::Assignment(a) if a.task.id == "t1"));
    }

    #[tokio::test]
    async fn test_poll_server_error_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client(&server).await.poll().await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_submit_bid_posts_price() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/intents/i1/bids"))
            .and(body_partial_json(serde_json::json!({
                "agent_id": "agent-1",
                "price": 10.0,
                "currency": "PIN"
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .await
            .submit_bid("i1", &Bid::new(10.0, "PIN"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_submit_result_posts_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/assignments/a1/result"))
            .and(body_partial_json(serde_json::json!({
                "task_id": "t1",
                "success": false,
                "error": "bad"
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let result = TaskResultSubmission {
            agent_id: "agent-1".to_string(),
            assignment_id: "a1".to_string(),
            task_id: "t1".to_string(),
            success: false,
            data: Vec::new(),
            error: Some("bad".to_string()),
        };
        client(&server).await.submit_result(&result).await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_matcher_is_transport() {
        let client = HttpMatcherClient::new("http://127.0.0.1:9", "agent-1", Duration::from_secs(2))
            .unwrap();
        let err = client.poll().await.unwrap_err();
        assert!(matches!(err, AgentError::Transport(_)));
    }
}
