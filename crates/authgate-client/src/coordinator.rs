//! Single-flight token refresh.
//!
//! At most one refresh call is outstanding per coordinator. Every caller,
//! whether a failed request or the proactive monitor, joins a FIFO waiter
//! queue; the first caller that finds the coordinator idle also starts the
//! refresh cycle. The cycle runs on its own task so that a caller dropping
//! its future cannot leave the queue undrained.

use std::collections::VecDeque;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::oneshot;
use tracing::{Instrument, debug, error, info, info_span, warn};

use authgate_auth::TokenStore;
use authgate_core::error::{AppError, ErrorKind};
use authgate_core::result::AppResult;

use crate::envelope::{ApiEnvelope, TokenPayload, error_message};
use crate::interceptor::{base_path, normalize_path, path_matches};
use crate::reauth::{ReauthHandler, ReauthReason};
use crate::request::ApiRequest;
use crate::transport::Transport;

/// What asked for a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// A protected request was rejected as unauthorized.
    Unauthorized,
    /// The proactive monitor saw the access token near expiry.
    Proactive,
    /// An explicit call to refresh.
    Manual,
}

impl fmt::Display for RefreshTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Proactive => write!(f, "proactive"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

type Waiter = oneshot::Sender<AppResult<String>>;

/// In-memory coordination state. `pending` is only non-empty while
/// `in_flight` is set.
#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    pending: VecDeque<Waiter>,
}

/// Coordinates token refreshes for one client.
pub struct RefreshCoordinator {
    /// Credential pair being refreshed.
    store: Arc<TokenStore>,
    /// Transport used for the refresh call.
    transport: Arc<dyn Transport>,
    /// Notified when the session cannot be recovered.
    reauth: Arc<dyn ReauthHandler>,
    /// Path of the refresh endpoint.
    refresh_path: String,
    /// Path of the base URL, empty for a bare host.
    base_path: String,
    /// Single-flight state.
    state: Mutex<RefreshState>,
    /// Refresh network calls issued.
    refresh_calls: AtomicU64,
}

impl fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refresh_path", &self.refresh_path)
            .field("in_flight", &self.is_refreshing())
            .field("refresh_calls", &self.refresh_calls())
            .finish()
    }
}

impl RefreshCoordinator {
    /// Creates an idle coordinator.
    pub fn new(
        store: Arc<TokenStore>,
        transport: Arc<dyn Transport>,
        reauth: Arc<dyn ReauthHandler>,
        refresh_path: impl Into<String>,
    ) -> Self {
        Self {
            store,
            transport,
            reauth,
            refresh_path: refresh_path.into(),
            base_path: String::new(),
            state: Mutex::new(RefreshState::default()),
            refresh_calls: AtomicU64::new(0),
        }
    }

    /// Also recognizes absolute URLs under `base_url` as the refresh endpoint.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_path = base_path(base_url);
        self
    }

    /// Whether `path` targets the refresh endpoint.
    pub fn is_refresh_endpoint(&self, path: &str) -> bool {
        path_matches(normalize_path(path), &self.refresh_path, &self.base_path)
    }

    /// Whether a refresh call is outstanding.
    pub fn is_refreshing(&self) -> bool {
        self.state.lock().in_flight
    }

    /// Callers waiting on the outstanding refresh.
    pub fn pending_waiters(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Refresh network calls issued since construction.
    pub fn refresh_calls(&self) -> u64 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Obtains a fresh access token, sharing any refresh already in flight.
    ///
    /// Without a stored refresh token no call is made: the store is cleared,
    /// re-authentication is signalled, and `AuthExpiredNoRefresh` is
    /// returned immediately.
    pub async fn refresh(self: &Arc<Self>, trigger: RefreshTrigger) -> AppResult<String> {
        let (waiter, outcome) = oneshot::channel();

        let start = {
            let mut state = self.state.lock();
            if state.in_flight {
                state.pending.push_back(waiter);
                debug!(%trigger, waiters = state.pending.len(), "Joined in-flight refresh");
                None
            } else {
                let Some(refresh_token) = self.store.refresh_token() else {
                    drop(state);
                    warn!(%trigger, "Refresh needed but no refresh token is stored");
                    return Err(self.abandon_session(
                        ReauthReason::NoRefreshToken,
                        AppError::auth_expired_no_refresh("No refresh token available"),
                    ));
                };
                state.in_flight = true;
                state.pending.push_back(waiter);
                Some((refresh_token, self.store.generation()))
            }
        };

        if let Some((refresh_token, generation)) = start {
            let coordinator = Arc::clone(self);
            let span = info_span!("token_refresh", %trigger);
            tokio::spawn(
                async move { coordinator.run_cycle(refresh_token, generation).await }
                    .instrument(span),
            );
        }

        outcome
            .await
            .unwrap_or_else(|_| Err(AppError::internal("Refresh cycle ended without an outcome")))
    }

    /// Clears the credential pair and signals re-authentication.
    ///
    /// Returns `err` for convenient propagation.
    pub fn abandon_session(&self, reason: ReauthReason, err: AppError) -> AppError {
        if let Err(e) = self.store.clear_tokens() {
            error!(error = %e, "Failed to clear tokens");
        }
        self.reauth.reauthentication_required(reason);
        err
    }

    async fn run_cycle(&self, refresh_token: String, generation: u64) {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        info!("Refreshing access token");

        let requested = AssertUnwindSafe(self.request_tokens(&refresh_token))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                Err(AppError::refresh_network_failure(
                    "Refresh transport panicked",
                ))
            });

        let outcome = match requested {
            Ok(tokens) => self.commit(tokens, generation),
            Err(err) => self.fail(err, generation),
        };

        let waiters = {
            let mut state = self.state.lock();
            state.in_flight = false;
            std::mem::take(&mut state.pending)
        };

        debug!(
            waiters = waiters.len(),
            success = outcome.is_ok(),
            "Refresh settled"
        );

        // A waiter whose caller went away has a closed receiver.
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }

    async fn request_tokens(&self, refresh_token: &str) -> AppResult<TokenPayload> {
        let request = ApiRequest::post(self.refresh_path.clone())
            .json(json!({ "refresh_token": refresh_token }));

        let response = self.transport.send(&request).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::RefreshNetworkFailure,
                format!("Refresh request failed: {}", e.message),
                e,
            )
        })?;

        if !response.is_success() {
            let detail = error_message(&response.body)
                .map(|m| format!(": {m}"))
                .unwrap_or_default();
            return Err(AppError::refresh_network_failure(format!(
                "Refresh endpoint returned {}{detail}",
                response.status
            )));
        }

        let envelope: ApiEnvelope<TokenPayload> = response.json().map_err(|e| {
            AppError::refresh_invalid_response(format!("Malformed refresh response: {}", e.message))
        })?;

        envelope.into_tokens().ok_or_else(|| {
            AppError::refresh_invalid_response("Refresh response did not carry an access token")
        })
    }

    fn commit(&self, tokens: TokenPayload, generation: u64) -> AppResult<String> {
        let rotated = tokens.refresh_token.is_some();
        match self.store.set_tokens_if_unchanged(
            generation,
            &tokens.access_token,
            tokens.refresh_token.as_deref(),
        ) {
            Ok(true) => {
                info!(rotated_refresh = rotated, "Access token refreshed");
                Ok(tokens.access_token)
            }
            Ok(false) => {
                warn!("Credentials changed during refresh, discarding the refreshed pair");
                self.store.access_token().ok_or_else(|| {
                    AppError::authentication("Session ended while the token was being refreshed")
                })
            }
            Err(e) => {
                error!(error = %e, "Failed to persist refreshed tokens");
                let err = AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to persist refreshed tokens: {}", e.message),
                    e,
                );
                // The pair may be half-written.
                if let Err(e) = self.store.clear_tokens() {
                    error!(error = %e, "Failed to clear partially stored tokens");
                }
                self.reauth
                    .reauthentication_required(ReauthReason::RefreshFailed(err.kind));
                Err(err)
            }
        }
    }

    fn fail(&self, err: AppError, generation: u64) -> AppResult<String> {
        warn!(error = %err, "Token refresh failed");
        match self.store.clear_tokens_if_unchanged(generation) {
            Ok(true) => {
                self.reauth
                    .reauthentication_required(ReauthReason::RefreshFailed(err.kind));
                Err(err)
            }
            Ok(false) => {
                warn!("Credentials changed during refresh, keeping the newer pair");
                self.store.access_token().ok_or(err)
            }
            Err(e) => {
                error!(error = %e, "Failed to clear tokens after refresh failure");
                self.reauth
                    .reauthentication_required(ReauthReason::RefreshFailed(err.kind));
                Err(err)
            }
        }
    }
}
