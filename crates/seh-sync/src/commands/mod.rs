//! Command implementations.

mod sites;
mod status;
mod sync;

pub use sites::cmd_sites;
pub use status::cmd_status;
pub use sync::cmd_sync;

use std::sync::Arc;

use anyhow::{Context, Result};

use seh_core::SolarEdgeClient;
use seh_sync::ApiConfig;

/// HTTP client configured from `[api]`.
pub(crate) fn build_client(api: &ApiConfig) -> Result<SolarEdgeClient> {
    let client = SolarEdgeClient::http(&api.base_url, &api.api_key, api.timeout())
        .context("Failed to create API client")?
        .with_rate_limiter(Arc::new(api.rate_limiter()))
        .with_retry_config(api.retry_config());
    Ok(client)
}

/// Render an optional value for text output.
pub(crate) fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
