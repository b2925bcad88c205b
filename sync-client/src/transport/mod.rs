//! Transport abstraction for rowsync.
//!
//! The session never talks HTTP directly. It builds an [`ApiRequest`]
//! (method, endpoint, flat string parameters, optional bearer token) and
//! hands it to a [`Transport`], which returns the status code and parsed
//! JSON body.
//!
//! # Design
//!
//! - [`HttpTransport`] talks to a real authority over HTTP(S)
//! - [`MockTransport`] replays queued responses and records requests
//!
//! # Example
//!
//! ```ignore
//! let transport = MockTransport::new();
//! transport.queue_response(Endpoint::GetSnapshot, ApiResponse::ok(json!({"rows": [], "rev": 0})));
//! let response = transport.send(ApiRequest::post(Endpoint::GetSnapshot).param("handle", "h")).await?;
//! ```

mod http;
mod mock;

pub use http::{HttpTransport, DEFAULT_AWAIT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
pub use mock::MockTransport;

use async_trait::async_trait;
use rowsync_types::Endpoint;
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    /// The authority could not be reached.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The request was sent but failed before a response arrived.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// The response body was not valid JSON.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The request timed out.
    #[error("request timeout")]
    Timeout,
}

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Parameters go in the query string.
    Get,
    /// Parameters go in a form body.
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
        }
    }
}

/// A request to the authority.
#[derive(Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Remote operation.
    pub endpoint: Endpoint,
    /// Flat string parameters.
    pub params: BTreeMap<String, String>,
    /// Bearer token, if any.
    pub auth_token: Option<String>,
}

impl ApiRequest {
    /// A POST request with no parameters.
    pub fn post(endpoint: Endpoint) -> Self {
        Self::new(Method::Post, endpoint)
    }

    /// A GET request with no parameters.
    pub fn get(endpoint: Endpoint) -> Self {
        Self::new(Method::Get, endpoint)
    }

    fn new(method: Method, endpoint: Endpoint) -> Self {
        Self {
            method,
            endpoint,
            params: BTreeMap::new(),
            auth_token: None,
        }
    }

    /// Add a parameter.
    pub fn param(mut self, name: &str, value: impl ToString) -> Self {
        self.params.insert(name.to_string(), value.to_string());
        self
    }

    /// Attach a bearer token.
    pub fn with_auth(mut self, token: Option<&str>) -> Self {
        self.auth_token = token.map(str::to_string);
        self
    }
}

impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("endpoint", &self.endpoint)
            .field("params", &self.params)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Status code and parsed body of a response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Parsed JSON body (`null` when empty).
    pub body: Json,
}

impl ApiResponse {
    /// A 200 response with the given body.
    pub fn ok(body: Json) -> Self {
        Self { status: 200, body }
    }

    /// A response with the given status and a `null` body.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Json::Null,
        }
    }

    /// True for 2xx status codes.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends requests to the authority.
///
/// Implementations own connection handling and timeouts. A long-poll that
/// ends without data may either return an empty body or
/// [`TransportError::Timeout`]; the session treats both as "unchanged".
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and wait for its response.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}
