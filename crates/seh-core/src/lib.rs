//! Access layer for the SolarEdge monitoring API.
//!
//! This crate provides the outbound side of the sync engine: a rate limiter
//! enforcing the vendor's concurrency and daily-quota limits, a retry policy
//! for transient failures, and a typed client for the endpoints the sync
//! strategies consume.
//!
//! # Features
//!
//! - **Rate limiting**: concurrency cap plus rolling 24-hour quota
//! - **Retries**: exponential backoff for network errors, 5xx and 429
//! - **Error taxonomy**: transient, throttled, quota, permanent, validation
//! - **Pluggable transport**: `reqwest` in production, [`MockTransport`] in tests
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use seh_core::{MockTransport, RateLimiter, RetryConfig, SolarEdgeClient};
//!
//! # #[tokio::main]
//! # async fn main() -> seh_core::Result<()> {
//! let mock = MockTransport::new();
//! mock.respond("/sites/list", 200, r#"{"sites":{"site":{"id":1,"name":"Roof"}}}"#);
//!
//! let client = SolarEdgeClient::with_transport(mock, "https://monitoringapi.solaredge.com", "KEY")?
//!     .with_rate_limiter(Arc::new(RateLimiter::new(3, 300)))
//!     .with_retry_config(RetryConfig::new(3));
//!
//! let sites = client.get_sites().await?;
//! assert_eq!(sites[0].name.as_deref(), Some("Roof"));
//! assert_eq!(client.remaining_requests(), 299);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod mock;
pub mod rate_limiter;
pub mod responses;
pub mod retry;
pub mod transport;

pub use client::{DEFAULT_BASE_URL, SolarEdgeClient};
pub use error::{Error, Result};
pub use mock::MockTransport;
pub use rate_limiter::{QUOTA_WINDOW, RateLimitLease, RateLimiter};
pub use retry::{RetryConfig, with_retry};
pub use transport::{ApiRequest, HttpTransport, RawResponse, Transport};

// Re-export the domain types crate for convenience
pub use seh_types;
