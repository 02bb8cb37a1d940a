//! Shared test helpers for integration tests.
//!
//! Runs a small axum backend on an ephemeral port that speaks the same
//! envelope and endpoints as a real API, and builds clients pointed at it.

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::{get, post};
use axum::{Json, Router};
use jsonwebtoken::{EncodingKey, Header, encode};
use parking_lot::Mutex;
use serde_json::{Value, json};

use authgate::{
    AuthClient, GatewayConfig, KeyValueStore, MemoryStore, ReauthNotifier, SessionService,
};
use authgate_core::config::StorageBackend;

pub const PASSWORD: &str = "correct horse";

/// How the refresh endpoint behaves.
#[derive(Debug, Clone)]
pub enum RefreshMode {
    /// Issue a new access token, rotating the refresh token if asked.
    Issue { rotate: bool },
    /// Answer with this status.
    Fail(StatusCode),
    /// Answer 200 with a body missing the access token.
    Malformed,
}

/// Mutable backend state shared with the handlers.
#[derive(Debug)]
pub struct ServerState {
    valid_access: Mutex<String>,
    valid_refresh: Mutex<String>,
    refresh_mode: Mutex<RefreshMode>,
    refresh_delay: Mutex<Duration>,
    access_ttl: AtomicI64,
    reject_protected: AtomicBool,
    issued: AtomicUsize,
    refresh_calls: AtomicUsize,
    protected_hits: AtomicUsize,
    logout_calls: AtomicUsize,
}

impl ServerState {
    fn new() -> Self {
        Self {
            valid_access: Mutex::new(String::new()),
            valid_refresh: Mutex::new(String::new()),
            refresh_mode: Mutex::new(RefreshMode::Issue { rotate: false }),
            refresh_delay: Mutex::new(Duration::ZERO),
            access_ttl: AtomicI64::new(900),
            reject_protected: AtomicBool::new(false),
            issued: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            protected_hits: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
        }
    }

    /// Mints and accepts a new access token.
    fn issue_access(&self) -> String {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let token = mint_token(self.access_ttl.load(Ordering::SeqCst), n);
        *self.valid_access.lock() = token.clone();
        token
    }

    /// Mints and accepts a new refresh token.
    fn issue_refresh(&self) -> String {
        let token = format!("refresh-{}", self.issued.load(Ordering::SeqCst));
        *self.valid_refresh.lock() = token.clone();
        token
    }

    fn is_authorized(&self, headers: &HeaderMap) -> bool {
        let expected = format!("Bearer {}", self.valid_access.lock());
        !self.reject_protected.load(Ordering::SeqCst)
            && headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v == expected)
    }
}

/// Mints an HS256 token for `user-42` expiring `ttl` seconds from now.
pub fn mint_token(ttl: i64, n: usize) -> String {
    let now = chrono::Utc::now().timestamp();
    encode(
        &Header::default(),
        &json!({
            "sub": "user-42",
            "email": "ada@example.com",
            "role": "editor",
            "iat": now,
            "exp": now + ttl,
            "jti": n,
        }),
        &EncodingKey::from_secret(b"integration-secret"),
    )
    .unwrap()
}

fn ok(data: Value) -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "success": true, "data": data })))
}

fn fail(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "success": false, "message": message })))
}

async fn login(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if body["password"] != PASSWORD {
        return fail(StatusCode::UNAUTHORIZED, "Invalid credentials");
    }
    let access = state.issue_access();
    let refresh = state.issue_refresh();
    ok(json!({ "access_token": access, "refresh_token": refresh }))
}

async fn register(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if body["email"].as_str().is_none_or(str::is_empty) {
        return fail(StatusCode::BAD_REQUEST, "Email is required");
    }
    let access = state.issue_access();
    let refresh = state.issue_refresh();
    ok(json!({ "access_token": access, "refresh_token": refresh }))
}

async fn refresh(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    let delay = *state.refresh_delay.lock();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let expected = state.valid_refresh.lock().clone();
    if body["refresh_token"].as_str() != Some(expected.as_str()) {
        return fail(StatusCode::UNAUTHORIZED, "Invalid refresh token");
    }

    let mode = state.refresh_mode.lock().clone();
    match mode {
        RefreshMode::Issue { rotate } => {
            let access = state.issue_access();
            if rotate {
                let refresh = state.issue_refresh();
                ok(json!({ "access_token": access, "refresh_token": refresh }))
            } else {
                ok(json!({ "access_token": access }))
            }
        }
        RefreshMode::Fail(status) => fail(status, "Refresh unavailable"),
        RefreshMode::Malformed => ok(json!({ "token": "wrong-field" })),
    }
}

async fn logout(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if !state.is_authorized(&headers) {
        return fail(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    state.logout_calls.fetch_add(1, Ordering::SeqCst);
    *state.valid_access.lock() = String::new();
    *state.valid_refresh.lock() = String::new();
    ok(json!({ "message": "Logged out" }))
}

async fn forgot_password(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    match body["email"].as_str() {
        Some(_) => ok(json!({ "message": "Reset email sent" })),
        None => fail(StatusCode::BAD_REQUEST, "Email is required"),
    }
}

async fn projects(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    state.protected_hits.fetch_add(1, Ordering::SeqCst);
    if !state.is_authorized(&headers) {
        return fail(StatusCode::UNAUTHORIZED, "Token expired");
    }
    ok(json!([{ "id": 1, "name": "apollo" }, { "id": 2, "name": "gemini" }]))
}

async fn broken(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if !state.is_authorized(&headers) {
        return fail(StatusCode::UNAUTHORIZED, "Token expired");
    }
    fail(StatusCode::INTERNAL_SERVER_ERROR, "Database unavailable")
}

/// A running fake backend.
pub struct TestServer {
    /// Base URL including the `/api` prefix.
    pub base_url: String,
    /// Backend state.
    pub state: Arc<ServerState>,
}

impl TestServer {
    /// Starts a backend on an ephemeral port.
    pub async fn start() -> Self {
        let state = Arc::new(ServerState::new());

        let api = Router::new()
            .route("/auth/login", post(login))
            .route("/auth/register", post(register))
            .route("/auth/refresh", post(refresh))
            .route("/auth/logout", post(logout))
            .route("/auth/forgot-password", post(forgot_password))
            .route("/projects", get(projects))
            .route("/broken", get(broken))
            .with_state(state.clone());
        let router = Router::new().nest("/api", api);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}/api"),
            state,
        }
    }

    /// Configuration pointing at this backend with in-memory storage.
    pub fn config(&self) -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.client.base_url = self.base_url.clone();
        config.client.timeout_seconds = 5;
        config.storage.backend = StorageBackend::Memory;
        config
    }

    /// A client with its own in-memory store and a reauth notifier.
    pub fn client(&self) -> (Arc<AuthClient>, Arc<ReauthNotifier>) {
        self.client_with_storage(Arc::new(MemoryStore::new()))
    }

    /// A client persisting into `storage`.
    pub fn client_with_storage(
        &self,
        storage: Arc<dyn KeyValueStore>,
    ) -> (Arc<AuthClient>, Arc<ReauthNotifier>) {
        let notifier = Arc::new(ReauthNotifier::default());
        let client = AuthClient::builder(self.config())
            .storage(storage)
            .reauth_handler(notifier.clone())
            .build()
            .unwrap();
        (Arc::new(client), notifier)
    }

    /// A client that has already logged in.
    pub async fn logged_in_client(&self) -> (Arc<AuthClient>, Arc<ReauthNotifier>) {
        let (client, notifier) = self.client();
        SessionService::new(client.clone())
            .login("ada@example.com", PASSWORD)
            .await
            .unwrap();
        (client, notifier)
    }

    /// Makes every access token issued so far invalid.
    pub fn revoke_access(&self) {
        *self.state.valid_access.lock() = "revoked".to_string();
    }

    pub fn set_refresh_mode(&self, mode: RefreshMode) {
        *self.state.refresh_mode.lock() = mode;
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.state.refresh_delay.lock() = delay;
    }

    /// Lifetime in seconds of access tokens issued from now on.
    pub fn set_access_ttl(&self, seconds: i64) {
        self.state.access_ttl.store(seconds, Ordering::SeqCst);
    }

    /// Rejects every protected request, even with a valid token.
    pub fn reject_protected(&self) {
        self.state.reject_protected.store(true, Ordering::SeqCst);
    }

    pub fn valid_access(&self) -> String {
        self.state.valid_access.lock().clone()
    }

    pub fn valid_refresh(&self) -> String {
        self.state.valid_refresh.lock().clone()
    }

    pub fn refresh_calls(&self) -> usize {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn protected_hits(&self) -> usize {
        self.state.protected_hits.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.state.logout_calls.load(Ordering::SeqCst)
    }
}

/// Polls `condition` every 10ms, failing the test after five seconds.
pub async fn eventually(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached within 5s");
}

/// Awaits `future`, failing the test after five seconds.
pub async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("future did not complete within 5s")
}
