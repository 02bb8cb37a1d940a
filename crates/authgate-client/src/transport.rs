//! HTTP transport seam.

use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use authgate_core::config::ClientConfig;
use authgate_core::result::AppResult;

use crate::request::{ApiRequest, ApiResponse};

/// Sends a fully prepared request. Implementations do no auth handling.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug + 'static {
    /// Sends the request and returns whatever the server answered.
    ///
    /// Only transport-level failures are errors; every HTTP status,
    /// including 4xx/5xx, is returned as a response.
    async fn send(&self, request: &ApiRequest) -> AppResult<ApiResponse>;
}

/// Transport backed by a `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    /// Shared connection pool.
    client: reqwest::Client,
    /// Base URL without a trailing slash.
    base_url: String,
}

impl ReqwestTransport {
    /// Creates a transport from client configuration.
    pub fn new(config: &ClientConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self::with_client(client, &config.base_url))
    }

    /// Wraps an existing client.
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Resolves a request path against the base URL.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> AppResult<ApiResponse> {
        let url = self.url_for(&request.path);
        trace!(request_id = %request.id, method = %request.method, %url, "Sending request");

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        trace!(request_id = %request.id, status = status.as_u16(), "Received response");

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}
