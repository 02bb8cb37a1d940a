//! The authenticated client.
//!
//! [`AuthClient`] runs every request through the [`RequestInterceptor`],
//! sends it, and on an authorization failure recovers through the shared
//! [`RefreshCoordinator`] before replaying the request once.

use std::sync::Arc;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{Instrument, debug, info_span, warn};

use authgate_auth::storage;
use authgate_auth::{TokenKeys, TokenStore};
use authgate_core::config::GatewayConfig;
use authgate_core::error::AppError;
use authgate_core::result::AppResult;
use authgate_core::traits::KeyValueStore;

use crate::coordinator::{RefreshCoordinator, RefreshTrigger};
use crate::envelope::error_message;
use crate::interceptor::{RequestInterceptor, attach_bearer};
use crate::monitor::RefreshMonitor;
use crate::reauth::{ReauthHandler, ReauthNotifier, ReauthReason};
use crate::request::{ApiRequest, ApiResponse};
use crate::transport::{ReqwestTransport, Transport};

/// Builds an [`AuthClient`].
///
/// Anything not supplied is created from the configuration: the key-value
/// backend from `[storage]`, a [`ReqwestTransport`] from `[client]`, and a
/// [`ReauthNotifier`] with no subscribers.
#[derive(Debug)]
pub struct AuthClientBuilder {
    config: GatewayConfig,
    token_store: Option<Arc<TokenStore>>,
    storage: Option<Arc<dyn KeyValueStore>>,
    transport: Option<Arc<dyn Transport>>,
    reauth: Option<Arc<dyn ReauthHandler>>,
}

impl AuthClientBuilder {
    /// Starts a builder from configuration.
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            token_store: None,
            storage: None,
            transport: None,
            reauth: None,
        }
    }

    /// Uses an existing token store.
    pub fn token_store(mut self, store: Arc<TokenStore>) -> Self {
        self.token_store = Some(store);
        self
    }

    /// Persists tokens into `backend` with the configured keys.
    pub fn storage(mut self, backend: Arc<dyn KeyValueStore>) -> Self {
        self.storage = Some(backend);
        self
    }

    /// Sends requests through `transport`.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Notifies `handler` when re-authentication is required.
    pub fn reauth_handler(mut self, handler: Arc<dyn ReauthHandler>) -> Self {
        self.reauth = Some(handler);
        self
    }

    /// Builds the client.
    pub fn build(self) -> AppResult<AuthClient> {
        let store = match (self.token_store, self.storage) {
            (Some(store), _) => store,
            (None, Some(backend)) => Arc::new(TokenStore::with_keys(
                backend,
                TokenKeys::from(&self.config.storage),
            )),
            (None, None) => Arc::new(TokenStore::with_keys(
                storage::from_config(&self.config.storage)?,
                TokenKeys::from(&self.config.storage),
            )),
        };

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&self.config.client)?),
        };

        let reauth: Arc<dyn ReauthHandler> = match self.reauth {
            Some(handler) => handler,
            None => Arc::new(ReauthNotifier::default()),
        };

        let base_url = &self.config.client.base_url;
        let coordinator = Arc::new(
            RefreshCoordinator::new(
                store.clone(),
                transport.clone(),
                reauth,
                self.config.endpoints.refresh.clone(),
            )
            .with_base_url(base_url),
        );
        let interceptor =
            RequestInterceptor::new(store.clone(), &self.config.endpoints).with_base_url(base_url);

        Ok(AuthClient {
            config: self.config,
            store,
            transport,
            interceptor,
            coordinator,
        })
    }
}

/// HTTP client that manages bearer credentials transparently.
#[derive(Debug)]
pub struct AuthClient {
    /// Gateway configuration.
    config: GatewayConfig,
    /// Credential pair.
    store: Arc<TokenStore>,
    /// Underlying transport.
    transport: Arc<dyn Transport>,
    /// Bearer attachment.
    interceptor: RequestInterceptor,
    /// Single-flight refresh shared with the monitor.
    coordinator: Arc<RefreshCoordinator>,
}

impl AuthClient {
    /// Starts building a client.
    pub fn builder(config: GatewayConfig) -> AuthClientBuilder {
        AuthClientBuilder::new(config)
    }

    /// Gateway configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The credential store.
    pub fn token_store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    /// The refresh coordinator.
    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    /// The request interceptor.
    pub fn interceptor(&self) -> &RequestInterceptor {
        &self.interceptor
    }

    /// A stopped proactive refresh monitor sharing this client's
    /// coordinator.
    pub fn monitor(&self) -> RefreshMonitor {
        RefreshMonitor::from_config(
            self.coordinator.clone(),
            self.store.clone(),
            &self.config.refresh,
        )
    }

    /// Sends a request, refreshing and replaying once on an authorization
    /// failure.
    ///
    /// Every response other than an authorization failure on a protected
    /// endpoint is returned as-is, including 4xx and 5xx.
    pub async fn send(&self, request: ApiRequest) -> AppResult<ApiResponse> {
        let span = info_span!(
            "request",
            request_id = %request.id,
            method = %request.method,
            path = %request.path
        );

        let request_id = request.id;
        match request.cancel.clone() {
            Some(cancel) => {
                if cancel.is_cancelled() {
                    return Err(AppError::cancelled("Request aborted before sending"));
                }
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!(%request_id, "Request aborted");
                        Err(AppError::cancelled("Request aborted"))
                    }
                    result = self.execute(request).instrument(span) => result,
                }
            }
            None => self.execute(request).instrument(span).await,
        }
    }

    /// Sends a request with the current credential but never refreshes.
    pub async fn send_without_refresh(&self, request: ApiRequest) -> AppResult<ApiResponse> {
        self.dispatch(&request).await
    }

    /// Refreshes the access token now, joining any refresh in flight.
    pub async fn refresh_now(&self) -> AppResult<String> {
        self.coordinator.refresh(RefreshTrigger::Manual).await
    }

    /// Sends a `GET` to `path`.
    pub async fn get(&self, path: &str) -> AppResult<ApiResponse> {
        self.send(ApiRequest::get(path)).await
    }

    /// Sends a `POST` with a JSON body.
    pub async fn post(&self, path: &str, body: Value) -> AppResult<ApiResponse> {
        self.send(ApiRequest::post(path).json(body)).await
    }

    /// Sends a `PUT` with a JSON body.
    pub async fn put(&self, path: &str, body: Value) -> AppResult<ApiResponse> {
        self.send(ApiRequest::put(path).json(body)).await
    }

    /// Sends a `PATCH` with a JSON body.
    pub async fn patch(&self, path: &str, body: Value) -> AppResult<ApiResponse> {
        self.send(ApiRequest::patch(path).json(body)).await
    }

    /// Sends a `DELETE` to `path`.
    pub async fn delete(&self, path: &str) -> AppResult<ApiResponse> {
        self.send(ApiRequest::delete(path)).await
    }

    /// Sends `request` and deserializes a successful JSON body.
    ///
    /// A non-2xx response becomes an `ErrorKind::Rejected` error carrying
    /// the backend's message when it sent one.
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> AppResult<T> {
        let response = self.send(request).await?;
        if !response.is_success() {
            let message = error_message(&response.body)
                .unwrap_or_else(|| format!("Request failed with status {}", response.status));
            return Err(AppError::rejected(message));
        }
        response.json()
    }

    /// `GET path` and deserialize the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        self.send_json(ApiRequest::get(path)).await
    }

    fn is_auth_failure(&self, status: StatusCode) -> bool {
        self.config
            .refresh
            .auth_failure_statuses
            .contains(&status.as_u16())
    }

    async fn dispatch(&self, request: &ApiRequest) -> AppResult<ApiResponse> {
        let mut outgoing = request.clone();
        self.interceptor.apply(&mut outgoing);
        self.transport.send(&outgoing).await
    }

    async fn execute(&self, request: ApiRequest) -> AppResult<ApiResponse> {
        let response = self.dispatch(&request).await?;
        if !self.is_auth_failure(response.status) {
            return Ok(response);
        }
        self.recover(request, response).await
    }

    async fn recover(&self, mut request: ApiRequest, response: ApiResponse) -> AppResult<ApiResponse> {
        if self.interceptor.is_public(&request.path) {
            debug!(status = response.status.as_u16(), "Public endpoint rejected the request");
            return Ok(response);
        }

        if self.coordinator.is_refresh_endpoint(&request.path) {
            warn!("Refresh endpoint rejected the request, ending session");
            return Err(self.coordinator.abandon_session(
                ReauthReason::RefreshEndpointRejected,
                AppError::refresh_network_failure(format!(
                    "Refresh endpoint returned {}",
                    response.status
                )),
            ));
        }

        if request.retried {
            return Err(self.rejected_after_retry(&request, response.status));
        }

        debug!(status = response.status.as_u16(), "Authorization failed, refreshing");
        let token = self.coordinator.refresh(RefreshTrigger::Unauthorized).await?;

        request.retried = true;
        let mut replay = request.clone();
        attach_bearer(&mut replay, &token);

        let response = self.transport.send(&replay).await?;
        if self.is_auth_failure(response.status) {
            return Err(self.rejected_after_retry(&request, response.status));
        }

        debug!(status = response.status.as_u16(), "Replayed request after refresh");
        Ok(response)
    }

    fn rejected_after_retry(&self, request: &ApiRequest, status: StatusCode) -> AppError {
        warn!(status = status.as_u16(), "Request rejected again after refresh");
        AppError::request_failed_after_retry(format!(
            "{} {} returned {} after a token refresh",
            request.method, request.path, status
        ))
    }
}
