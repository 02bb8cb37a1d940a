//! Scripted backend for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use jsonwebtoken::{EncodingKey, Header, encode};
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde_json::{Value, json};
use tokio::sync::Notify;

use authgate_auth::{MemoryStore, TokenStore};
use authgate_core::error::AppError;
use authgate_core::result::AppResult;

use crate::coordinator::RefreshCoordinator;
use crate::reauth::ReauthNotifier;
use crate::request::{ApiRequest, ApiResponse};
use crate::transport::Transport;

pub(crate) const REFRESH_PATH: &str = "/auth/refresh";

/// Mints a token expiring `seconds` from now.
pub(crate) fn token_expiring_in(seconds: i64, tag: &str) -> String {
    token_with_exp(chrono::Utc::now().timestamp() + seconds, tag)
}

/// Mints a token with an absolute `exp`.
pub(crate) fn token_with_exp(exp: i64, tag: &str) -> String {
    encode(
        &Header::default(),
        &json!({ "sub": "user-1", "jti": tag, "exp": exp }),
        &EncodingKey::from_secret(b"test-secret"),
    )
    .unwrap()
}

/// What the refresh endpoint answers.
#[derive(Debug, Clone)]
pub(crate) enum RefreshBehaviour {
    /// Issue a new access token, rotating the refresh token if asked.
    Issue { rotate: bool },
    /// Answer with a bare status.
    Status(StatusCode),
    /// Answer 200 with this body.
    Body(Value),
    /// Fail at the transport level.
    NetworkError,
}

/// Accepts exactly one access token; the refresh endpoint issues the next.
#[derive(Debug)]
pub(crate) struct FakeBackend {
    valid_token: Mutex<String>,
    behaviour: Mutex<RefreshBehaviour>,
    gate: Mutex<Option<Arc<Notify>>>,
    issued: AtomicUsize,
    refresh_calls: AtomicUsize,
    reject_all: AtomicBool,
    requests: Mutex<Vec<ApiRequest>>,
}

impl FakeBackend {
    pub(crate) fn new(valid_token: &str) -> Arc<Self> {
        Arc::new(Self {
            valid_token: Mutex::new(valid_token.to_string()),
            behaviour: Mutex::new(RefreshBehaviour::Issue { rotate: false }),
            gate: Mutex::new(None),
            issued: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            reject_all: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn set_behaviour(&self, behaviour: RefreshBehaviour) {
        *self.behaviour.lock() = behaviour;
    }

    /// Holds every refresh response until the returned gate is notified.
    pub(crate) fn gate_refresh(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    pub(crate) fn reject_all(&self) {
        self.reject_all.store(true, Ordering::SeqCst);
    }

    pub(crate) fn valid_token(&self) -> String {
        self.valid_token.lock().clone()
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }

    fn refresh_response(&self, behaviour: RefreshBehaviour) -> AppResult<ApiResponse> {
        match behaviour {
            RefreshBehaviour::Issue { rotate } => {
                let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
                let access = token_expiring_in(900, &format!("access-{n}"));
                *self.valid_token.lock() = access.clone();
                let mut data = json!({ "access_token": access });
                if rotate {
                    data["refresh_token"] = json!(format!("refresh-{n}"));
                }
                Ok(ApiResponse::json_body(
                    StatusCode::OK,
                    &json!({ "success": true, "data": data }),
                ))
            }
            RefreshBehaviour::Status(status) => Ok(ApiResponse::json_body(
                status,
                &json!({ "success": false, "message": "refresh rejected" }),
            )),
            RefreshBehaviour::Body(body) => Ok(ApiResponse::json_body(StatusCode::OK, &body)),
            RefreshBehaviour::NetworkError => Err(AppError::transport("connection reset by peer")),
        }
    }
}

#[async_trait]
impl Transport for FakeBackend {
    async fn send(&self, request: &ApiRequest) -> AppResult<ApiResponse> {
        self.requests.lock().push(request.clone());

        if request.path == REFRESH_PATH {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.gate.lock().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            let behaviour = self.behaviour.lock().clone();
            return self.refresh_response(behaviour);
        }

        let authorized = !self.reject_all.load(Ordering::SeqCst)
            && request.bearer_token() == Some(self.valid_token().as_str());
        if authorized {
            Ok(ApiResponse::json_body(
                StatusCode::OK,
                &json!({ "success": true, "data": { "path": request.path } }),
            ))
        } else {
            Ok(ApiResponse::json_body(
                StatusCode::UNAUTHORIZED,
                &json!({ "success": false, "message": "Unauthorized" }),
            ))
        }
    }
}

/// Token store, notifier, and coordinator wired to `backend`.
pub(crate) fn harness(
    backend: Arc<FakeBackend>,
) -> (Arc<TokenStore>, Arc<ReauthNotifier>, Arc<RefreshCoordinator>) {
    let store = Arc::new(TokenStore::new(Arc::new(MemoryStore::new())));
    let notifier = Arc::new(ReauthNotifier::default());
    let coordinator = Arc::new(RefreshCoordinator::new(
        store.clone(),
        backend,
        notifier.clone(),
        REFRESH_PATH,
    ));
    (store, notifier, coordinator)
}

/// Yields until `condition` holds.
pub(crate) async fn wait_until(condition: impl Fn() -> bool) {
    while !condition() {
        tokio::task::yield_now().await;
    }
}
