//! HTTP seam between [`SolarEdgeClient`](crate::SolarEdgeClient) and the network.
//!
//! The client never talks to `reqwest` directly; it issues [`ApiRequest`]s
//! through a [`Transport`]. [`HttpTransport`] is the production
//! implementation and [`MockTransport`](crate::MockTransport) scripts
//! responses for tests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{Error, Result};

/// One GET request: a path below the base URL plus query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
        }
    }

    /// Append a query parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Value of the first query parameter named `key`.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Raw HTTP response: status code and body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs one HTTP GET.
///
/// Implementations return `Ok` for every response the server produced,
/// whatever its status; status classification belongs to the client.
/// Connection-level failures (DNS, refused, timeout) map to
/// [`Error::Transient`] with no status.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, base_url: &str, request: &ApiRequest) -> Result<RawResponse>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a transport whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("seh/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Create a transport with a custom reqwest Client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, base_url: &str, request: &ApiRequest) -> Result<RawResponse> {
        let url = format!("{}{}", base_url, request.path);
        let response = self
            .client
            .get(&url)
            .query(&request.query)
            .send()
            .await
            .map_err(|e| Error::Transient {
                status: None,
                // The URL carries the API key; keep it out of messages.
                message: if e.is_timeout() {
                    format!("request timed out: {}", request.path)
                } else {
                    format!("request failed: {}", e.without_url())
                },
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| Error::Transient {
            status: Some(status),
            message: format!("failed to read response body: {}", e.without_url()),
        })?;

        Ok(RawResponse { status, body })
    }
}
