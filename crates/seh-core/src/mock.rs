//! Mock transport for testing.
//!
//! [`MockTransport`] implements [`Transport`] without touching the network,
//! so the client, the strategies and the orchestrator can be exercised
//! against scripted vendor responses.
//!
//! # Features
//!
//! - **Sticky routes**: a fixed response for every request to a path
//! - **Queued responses**: one-shot responses consumed in order before the
//!   sticky route, e.g. a 500 followed by a 200
//! - **Failure injection**: connection-level failures with no HTTP status
//! - **Latency simulation**: a delay before every response
//! - **Request recording**: every request is kept for assertions
//!
//! Requests to a path with no route answer HTTP 404.
//!
//! # Example
//!
//! ```
//! use seh_core::{ApiRequest, MockTransport, Transport};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let mock = MockTransport::new();
//! mock.enqueue("/sites/list", 500, "oops");
//! mock.respond("/sites/list", 200, r#"{"sites":{"count":0,"site":[]}}"#);
//!
//! let req = ApiRequest::new("/sites/list");
//! assert_eq!(mock.get("http://mock", &req).await.unwrap().status, 500);
//! assert_eq!(mock.get("http://mock", &req).await.unwrap().status, 200);
//! assert_eq!(mock.request_count(), 2);
//! # }
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::transport::{ApiRequest, RawResponse, Transport};

#[derive(Debug, Default)]
struct MockState {
    routes: HashMap<String, RawResponse>,
    queued: HashMap<String, VecDeque<Result<RawResponse>>>,
    requests: Vec<ApiRequest>,
    latency: Duration,
}

/// Scriptable in-memory [`Transport`].
///
/// Clones share state, so a test can keep one handle for assertions while
/// the client owns another.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer every request to `path` with `status` and `body`.
    pub fn respond(&self, path: &str, status: u16, body: impl Into<String>) {
        self.state()
            .routes
            .insert(path.to_string(), RawResponse::new(status, body));
    }

    /// Answer every request to `path` with HTTP 200 and `body` as JSON.
    pub fn respond_json(&self, path: &str, body: &serde_json::Value) {
        self.respond(path, 200, body.to_string());
    }

    /// Answer the next request to `path` with `status` and `body`.
    pub fn enqueue(&self, path: &str, status: u16, body: impl Into<String>) {
        self.state()
            .queued
            .entry(path.to_string())
            .or_default()
            .push_back(Ok(RawResponse::new(status, body)));
    }

    /// Fail the next request to `path` at connection level.
    pub fn enqueue_network_failure(&self, path: &str, message: &str) {
        self.state()
            .queued
            .entry(path.to_string())
            .or_default()
            .push_back(Err(Error::Transient {
                status: None,
                message: message.to_string(),
            }));
    }

    /// Delay every response by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = latency;
    }

    /// Every request seen so far, in arrival order.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.state().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state().requests.len()
    }

    /// Number of requests seen for `path`.
    pub fn requests_for(&self, path: &str) -> usize {
        self.state()
            .requests
            .iter()
            .filter(|r| r.path == path)
            .count()
    }

    /// Forget recorded requests. Routes and queues are kept.
    pub fn clear_requests(&self) {
        self.state().requests.clear();
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, _base_url: &str, request: &ApiRequest) -> Result<RawResponse> {
        let (latency, outcome) = {
            let mut state = self.state();
            state.requests.push(request.clone());
            let queued = state
                .queued
                .get_mut(&request.path)
                .and_then(VecDeque::pop_front);
            let outcome = match queued {
                Some(outcome) => outcome,
                None => Ok(state
                    .routes
                    .get(&request.path)
                    .cloned()
                    .unwrap_or_else(|| RawResponse::new(404, "Not found"))),
            };
            (state.latency, outcome)
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_takes_precedence_over_route() {
        let mock = MockTransport::new();
        mock.respond("/a", 200, "sticky");
        mock.enqueue("/a", 503, "first");
        mock.enqueue_network_failure("/a", "reset");

        let req = ApiRequest::new("/a");
        assert_eq!(mock.get("", &req).await.unwrap().status, 503);
        assert!(matches!(
            mock.get("", &req).await,
            Err(Error::Transient { status: None, .. })
        ));
        assert_eq!(mock.get("", &req).await.unwrap().body, "sticky");
        assert_eq!(mock.get("", &req).await.unwrap().body, "sticky");
        assert_eq!(mock.requests_for("/a"), 4);
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let mock = MockTransport::new();
        let response = mock.get("", &ApiRequest::new("/missing")).await.unwrap();
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let mock = MockTransport::new();
        let handle = mock.clone();
        mock.respond_json("/x", &serde_json::json!({"ok": true}));
        handle
            .get("", &ApiRequest::new("/x").param("k", "v"))
            .await
            .unwrap();
        assert_eq!(mock.request_count(), 1);
        assert_eq!(mock.requests()[0].query_value("k"), Some("v"));
        mock.clear_requests();
        assert_eq!(handle.request_count(), 0);
    }
}
