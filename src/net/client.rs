//! HTTP client shared by project discovery and generation calls.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::config::BackendConfig;

/// User agent sent on every backend call.
pub const USER_AGENT: &str = concat!("gemrelay/", env!("CARGO_PKG_VERSION"));

/// reqwest client carrying the backend timeouts and user agent.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
}

impl HttpClient {
    pub fn inner(&self) -> &Client {
        &self.inner
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug, Clone)]
pub struct HttpClientBuilder {
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl HttpClientBuilder {
    /// Timeouts taken from the `[backend]` config section.
    pub fn from_backend(config: &BackendConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            request_timeout: config.request_timeout(),
        }
    }

    pub fn build(self) -> Result<HttpClient, reqwest::Error> {
        debug!(
            connect_timeout = ?self.connect_timeout,
            request_timeout = ?self.request_timeout,
            "Building HTTP client"
        );
        let inner = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .build()?;
        Ok(HttpClient { inner })
    }
}
