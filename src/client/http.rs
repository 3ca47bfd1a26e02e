//! Shared HTTP plumbing and failure classification.
//!
//! | Failure                              | Class      |
//! |--------------------------------------|------------|
//! | connect / timeout / body read        | Transport  |
//! | 5xx, 408, 429                        | Transport  |
//! | any other 4xx                        | Validation |
//! | 2xx with an unparseable body         | Transport  |

use crate::error::{AgentError, Result};
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Maximum characters of a response body quoted in an error.
const BODY_EXCERPT_CHARS: usize = 300;

pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .map_err(|e| AgentError::Configuration(format!("failed to build HTTP client: {}", e)))
}

/// Join path segments onto a base URL, percent-encoding each segment.
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| AgentError::Configuration(format!("invalid endpoint '{}': {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| {
            AgentError::Configuration(format!("endpoint '{}' cannot carry a path", base))
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

pub(crate) fn send_error(what: &str, e: reqwest::Error) -> AgentError {
    let kind = if e.is_timeout() {
        "timed out"
    } else if e.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    AgentError::Transport(format!("{} {}: {}", what, kind, e))
}

pub(crate) fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

/// Turn a non-success response into a classified error; pass success through.
pub(crate) async fn check_status(what: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = format!("{} rejected with HTTP {}{}", what, status, excerpt(&body));
    if is_transient_status(status) {
        Err(AgentError::Transport(message))
    } else {
        Err(AgentError::Validation(message))
    }
}

/// Check the status and decode a JSON body.
pub(crate) async fn read_json<T: DeserializeOwned>(what: &str, response: Response) -> Result<T> {
    let response = check_status(what, response).await?;
    let bytes = response
        .bytes()
        .await
        .map_err(|e| AgentError::Transport(format!("{}: failed to read response: {}", what, e)))?;
    serde_json::from_slice(&bytes).map_err(|e| {
        AgentError::Transport(format!(
            "{}: malformed response ({}){}",
            what,
            e,
            excerpt(&String::from_utf8_lossy(&bytes))
        ))
    })
}

fn excerpt(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return String::new();
    }
    let mut text: String = body.chars().take(BODY_EXCERPT_CHARS).collect();
    if body.chars().count() > BODY_EXCERPT_CHARS {
        text.push_str("...");
    }
    format!(": {}", text)
}
