//! HTTP Client Factory
//!
//! Builds the reqwest client used by `HttpThreadsClient`.

use std::time::Duration;

use crate::types::{ClientConfig, ClientError, ClientResult};

/// Build a `reqwest::Client` from connection settings.
///
/// - `timeout_secs: Some(n)` -> whole-request timeout of `n` seconds
/// - `user_agent: Some(ua)` -> custom User-Agent header
pub fn build_http_client(config: &ClientConfig) -> ClientResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(secs) = config.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    let user_agent = config
        .user_agent
        .clone()
        .unwrap_or_else(|| format!("threadline/{}", env!("CARGO_PKG_VERSION")));
    builder = builder.user_agent(user_agent);

    builder
        .build()
        .map_err(|e| ClientError::network(format!("Failed to build HTTP client: {}", e)))
}
