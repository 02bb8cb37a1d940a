//! Request and response descriptors passed through the gateway.

use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use authgate_core::result::AppResult;

/// An outgoing request, independent of the transport that sends it.
///
/// The descriptor is cloned for every send so that a replay starts from the
/// caller's original headers rather than the intercepted ones.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// Identifier used in log spans.
    pub id: Uuid,
    /// HTTP method.
    pub method: Method,
    /// Path relative to the configured base URL, or an absolute URL.
    pub path: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// Optional JSON body.
    pub body: Option<Value>,
    /// Set once the request has been replayed after a token refresh.
    pub retried: bool,
    /// Abort signal owned by the caller.
    pub cancel: Option<CancellationToken>,
}

impl ApiRequest {
    /// Creates a request with no body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
            retried: false,
            cancel: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Sets the JSON body.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Adds a header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Attaches an abort signal. Cancelling it fails the request with
    /// `ErrorKind::Cancelled`.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The bearer token currently attached, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
    }
}

/// A response as seen by the gateway.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Raw body.
    pub body: Bytes,
}

impl ApiResponse {
    /// Creates a response with no headers.
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Creates a response with a JSON body.
    pub fn json_body(status: StatusCode, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> AppResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// The body as UTF-8 text, lossily decoded.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
