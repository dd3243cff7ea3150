//! Shared JSON-over-HTTP plumbing for the hosted services.
//!
//! Every service call goes through [`post_json`]: bearer auth, JSON body,
//! bounded timeout (set on the client), and a [`StatusError`] for non-2xx
//! responses that callers can downcast to decide whether to retry.

use anyhow::Result;
use std::fmt;
use std::time::Duration;

/// Build a client whose every request times out after `timeout_secs`.
pub fn client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// A non-success HTTP status returned by a service.
#[derive(Debug, Clone)]
pub struct StatusError {
    pub service: &'static str,
    pub status: u16,
    pub body: String,
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} API error {}: {}", self.service, self.status, self.body)
    }
}

impl std::error::Error for StatusError {}

impl StatusError {
    /// Rate limits and server errors may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        self.status == 429 || (500..600).contains(&self.status)
    }
}

/// True for errors worth retrying: network failures, 429 and 5xx.
pub fn is_transient(err: &anyhow::Error) -> bool {
    if let Some(status) = err.downcast_ref::<StatusError>() {
        return status.is_transient();
    }
    err.downcast_ref::<reqwest::Error>().is_some()
}

/// POST `body` to `url` and parse the JSON response.
pub async fn post_json(
    client: &reqwest::Client,
    service: &'static str,
    url: &str,
    api_key: &str,
    body: &serde_json::Value,
) -> Result<serde_json::Value> {
    let response = client
        .post(url)
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        return Err(StatusError {
            service,
            status: status.as_u16(),
            body: body_text,
        }
        .into());
    }

    Ok(response.json().await?)
}

/// Join a base URL and an endpoint path without doubling slashes.
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
