//! HTTP transport backed by reqwest.
//!
//! Endpoints are resolved against a base URL (`<base>/get_snapshot`, ...).
//! POST parameters travel as a form body, GET parameters as a query string.
//! The `await` long-poll gets its own, longer timeout.

use super::{ApiRequest, ApiResponse, Method, Transport, TransportError};
use async_trait::async_trait;
use rowsync_types::Endpoint;
use serde_json::Value as Json;
use std::time::Duration;

/// Timeout for ordinary requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for the `await` long-poll.
pub const DEFAULT_AWAIT_TIMEOUT: Duration = Duration::from_secs(90);

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::ConnectionFailed(e.to_string())
        } else {
            TransportError::RequestFailed(e.to_string())
        }
    }
}

/// Transport that talks to the authority over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    await_timeout: Duration,
}

impl HttpTransport {
    /// Create a transport for the authority at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            await_timeout: DEFAULT_AWAIT_TIMEOUT,
        })
    }

    /// Set the timeout for ordinary requests.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the timeout for the `await` long-poll.
    pub fn with_await_timeout(mut self, timeout: Duration) -> Self {
        self.await_timeout = timeout;
        self
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL of an endpoint.
    pub fn url(&self, endpoint: Endpoint) -> String {
        format!("{}/{}", self.base_url, endpoint.as_str())
    }

    fn timeout_for(&self, endpoint: Endpoint) -> Duration {
        match endpoint {
            Endpoint::Await => self.await_timeout,
            _ => self.request_timeout,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.url(request.endpoint);
        let builder = match request.method {
            Method::Get => self.client.get(&url).query(&request.params),
            Method::Post => self.client.post(&url).form(&request.params),
        };
        let builder = builder
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.timeout_for(request.endpoint));
        let builder = match &request.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            Json::Null
        } else {
            serde_json::from_str(&text).map_err(|e| TransportError::InvalidResponse(e.to_string()))?
        };

        Ok(ApiResponse { status, body })
    }
}
