//! Mock transport for testing.
//!
//! Allows queueing responses per endpoint and capturing sent requests for
//! verification.

use super::{ApiRequest, ApiResponse, Transport, TransportError};
use async_trait::async_trait;
use rowsync_types::Endpoint;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Mock transport for testing.
///
/// Responses are queued per endpoint and handed out in order. A request to
/// an endpoint with nothing queued gets a 404 with a `null` body.
#[derive(Debug, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    sent_requests: Vec<ApiRequest>,
    responses: HashMap<Endpoint, VecDeque<ApiResponse>>,
    fail_next: Option<TransportError>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next request to `endpoint`.
    pub fn queue_response(&self, endpoint: Endpoint, response: ApiResponse) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .responses
            .entry(endpoint)
            .or_default()
            .push_back(response);
    }

    /// Get all requests that were sent.
    pub fn sent_requests(&self) -> Vec<ApiRequest> {
        let inner = self.inner.lock().unwrap();
        inner.sent_requests.clone()
    }

    /// Get the requests sent to one endpoint.
    pub fn sent_to(&self, endpoint: Endpoint) -> Vec<ApiRequest> {
        let inner = self.inner.lock().unwrap();
        inner
            .sent_requests
            .iter()
            .filter(|r| r.endpoint == endpoint)
            .cloned()
            .collect()
    }

    /// Get the last request that was sent.
    pub fn last_sent(&self) -> Option<ApiRequest> {
        let inner = self.inner.lock().unwrap();
        inner.sent_requests.last().cloned()
    }

    /// Cause the next send() to fail with the given error.
    pub fn fail_next(&self, error: TransportError) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next = Some(error);
    }

    /// Clear all state (requests, queued responses, failures).
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        *inner = MockTransportInner::default();
    }
}

impl Clone for MockTransport {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut inner = self.inner.lock().unwrap();

        let endpoint = request.endpoint;
        inner.sent_requests.push(request);

        // Check for forced failure
        if let Some(error) = inner.fail_next.take() {
            return Err(error);
        }

        Ok(inner
            .responses
            .get_mut(&endpoint)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| ApiResponse::status(404)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ===========================================
    // MockTransport Basic Tests
    // ===========================================

    #[tokio::test]
    async fn mock_transport_records_requests() {
        let transport = MockTransport::new();

        transport
            .send(ApiRequest::post(Endpoint::GetSnapshot).param("handle", "h"))
            .await
            .unwrap();
        transport
            .send(ApiRequest::post(Endpoint::GetDeltas).param("rev", 2))
            .await
            .unwrap();

        let sent = transport.sent_requests();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].params["handle"], "h");
        assert_eq!(transport.sent_to(Endpoint::GetDeltas).len(), 1);
    }

    #[tokio::test]
    async fn mock_transport_returns_queued_responses_per_endpoint() {
        let transport = MockTransport::new();
        transport.queue_response(Endpoint::PutDelta, ApiResponse::ok(json!({"conflict": true})));
        transport.queue_response(Endpoint::PutDelta, ApiResponse::ok(json!({"rev": 5})));
        transport.queue_response(Endpoint::GetSnapshot, ApiResponse::ok(json!({"rev": 1})));

        let r1 = transport.send(ApiRequest::post(Endpoint::PutDelta)).await.unwrap();
        let r2 = transport.send(ApiRequest::post(Endpoint::PutDelta)).await.unwrap();
        let r3 = transport.send(ApiRequest::post(Endpoint::GetSnapshot)).await.unwrap();

        assert_eq!(r1.body, json!({"conflict": true}));
        assert_eq!(r2.body, json!({"rev": 5}));
        assert_eq!(r3.body, json!({"rev": 1}));
    }

    #[tokio::test]
    async fn mock_transport_unqueued_endpoint_is_404() {
        let transport = MockTransport::new();

        let response = transport.send(ApiRequest::get(Endpoint::Await)).await.unwrap();
        assert_eq!(response.status, 404);
    }

    // ===========================================
    // Error Condition Tests
    // ===========================================

    #[tokio::test]
    async fn forced_failure_applies_once() {
        let transport = MockTransport::new();
        transport.queue_response(Endpoint::GetDeltas, ApiResponse::ok(json!({"deltas": []})));
        transport.fail_next(TransportError::ConnectionFailed("network unreachable".into()));

        let result = transport.send(ApiRequest::post(Endpoint::GetDeltas)).await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));

        // Next send should work (and get the queued response)
        let response = transport.send(ApiRequest::post(Endpoint::GetDeltas)).await.unwrap();
        assert_eq!(response.body, json!({"deltas": []}));
    }

    // ===========================================
    // Clone and Shared State Tests
    // ===========================================

    #[tokio::test]
    async fn mock_transport_clone_shares_state() {
        let transport1 = MockTransport::new();
        let transport2 = transport1.clone();

        transport1.send(ApiRequest::post(Endpoint::PutDelta)).await.unwrap();
        transport2.send(ApiRequest::post(Endpoint::PutDelta)).await.unwrap();

        assert_eq!(transport1.sent_requests().len(), 2);
    }

    #[tokio::test]
    async fn mock_transport_reset_clears_all() {
        let transport = MockTransport::new();
        transport.queue_response(Endpoint::Await, ApiResponse::ok(json!({})));
        transport.send(ApiRequest::post(Endpoint::PutDelta)).await.unwrap();

        transport.reset();

        assert!(transport.sent_requests().is_empty());
        assert!(transport.last_sent().is_none());
        let response = transport.send(ApiRequest::get(Endpoint::Await)).await.unwrap();
        assert_eq!(response.status, 404);
    }
}
