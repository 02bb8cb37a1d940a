//! Integration tests for reactive refresh against a live HTTP backend.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use serde_json::{Value, json};

use authgate::{ErrorKind, KeyValueStore, MemoryStore, ReauthReason};
use helpers::{RefreshMode, TestServer, within};

#[tokio::test]
async fn test_valid_token_needs_no_refresh() {
    let server = TestServer::start().await;
    let (client, _notifier) = server.logged_in_client().await;

    let projects: Value = client.get_json("/projects").await.unwrap();

    assert_eq!(projects["data"][0]["name"], "apollo");
    assert_eq!(server.refresh_calls(), 0);
    assert_eq!(server.protected_hits(), 1);
}

#[tokio::test]
async fn test_concurrent_failures_share_one_refresh() {
    let server = TestServer::start().await;
    let (client, notifier) = server.logged_in_client().await;
    let original_refresh = client.token_store().refresh_token();

    server.revoke_access();
    server.set_refresh_delay(Duration::from_millis(200));

    let requests = (0..5).map(|_| {
        let client = client.clone();
        async move { client.get("/projects").await }
    });
    let responses = within(futures::future::join_all(requests)).await;

    for response in responses {
        assert_eq!(response.unwrap().status, StatusCode::OK);
    }
    assert_eq!(server.refresh_calls(), 1);
    assert_eq!(server.protected_hits(), 10);
    assert_eq!(client.token_store().access_token(), Some(server.valid_access()));
    assert_eq!(client.token_store().refresh_token(), original_refresh);
    assert_eq!(notifier.emitted(), 0);
}

#[tokio::test]
async fn test_rotated_refresh_token_is_used_next_time() {
    let server = TestServer::start().await;
    server.set_refresh_mode(RefreshMode::Issue { rotate: true });
    let (client, _notifier) = server.logged_in_client().await;
    let first_refresh = client.token_store().refresh_token().unwrap();

    server.revoke_access();
    client.get("/projects").await.unwrap();
    let second_refresh = client.token_store().refresh_token().unwrap();
    assert_ne!(first_refresh, second_refresh);
    assert_eq!(second_refresh, server.valid_refresh());

    server.revoke_access();
    client.get("/projects").await.unwrap();
    assert_eq!(server.refresh_calls(), 2);
}

#[tokio::test]
async fn test_failed_refresh_clears_session_and_signals_once() {
    let server = TestServer::start().await;
    let (client, notifier) = server.logged_in_client().await;
    let mut signals = notifier.subscribe();

    server.revoke_access();
    server.set_refresh_mode(RefreshMode::Fail(StatusCode::SERVICE_UNAVAILABLE));
    server.set_refresh_delay(Duration::from_millis(100));

    let (first, second) = within(async {
        tokio::join!(client.get("/projects"), client.get("/projects"))
    })
    .await;

    assert_eq!(first.unwrap_err().kind, ErrorKind::RefreshNetworkFailure);
    assert_eq!(second.unwrap_err().kind, ErrorKind::RefreshNetworkFailure);
    assert_eq!(server.refresh_calls(), 1);
    assert_eq!(client.token_store().access_token(), None);
    assert_eq!(client.token_store().refresh_token(), None);
    assert_eq!(notifier.emitted(), 1);
    assert_eq!(
        signals.recv().await.unwrap(),
        ReauthReason::RefreshFailed(ErrorKind::RefreshNetworkFailure)
    );
}

#[tokio::test]
async fn test_malformed_refresh_response() {
    let server = TestServer::start().await;
    let (client, notifier) = server.logged_in_client().await;

    server.revoke_access();
    server.set_refresh_mode(RefreshMode::Malformed);

    let err = client.get("/projects").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::RefreshInvalidResponse);
    assert!(!client.token_store().has_credentials());
    assert_eq!(notifier.emitted(), 1);
}

#[tokio::test]
async fn test_rejected_replay_is_not_retried_again() {
    let server = TestServer::start().await;
    let (client, notifier) = server.logged_in_client().await;

    server.reject_protected();

    let err = client.get("/projects").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::RequestFailedAfterRetry);
    assert_eq!(server.refresh_calls(), 1);
    assert_eq!(server.protected_hits(), 2);
    assert!(client.token_store().has_credentials());
    assert_eq!(notifier.emitted(), 0);
}

#[tokio::test]
async fn test_refresh_endpoint_failure_never_refreshes() {
    let server = TestServer::start().await;
    let (client, notifier) = server.logged_in_client().await;

    let err = client
        .post("/auth/refresh", json!({ "refresh_token": "forged" }))
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::RefreshNetworkFailure);
    assert_eq!(server.refresh_calls(), 1);
    assert_eq!(client.coordinator().refresh_calls(), 0);
    assert!(!client.token_store().has_credentials());
    assert_eq!(notifier.emitted(), 1);
}

#[tokio::test]
async fn test_other_failures_pass_through() {
    let server = TestServer::start().await;
    let (client, _notifier) = server.logged_in_client().await;

    let missing = client.get("/does-not-exist").await.unwrap();
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let broken = client.get("/broken").await.unwrap();
    assert_eq!(broken.status, StatusCode::INTERNAL_SERVER_ERROR);

    let err = client.get_json::<Value>("/broken").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Rejected);
    assert_eq!(err.message, "Database unavailable");

    assert_eq!(server.refresh_calls(), 0);
}

#[tokio::test]
async fn test_missing_refresh_token_forces_reauth() {
    let server = TestServer::start().await;
    let (client, notifier) = server.client();
    client
        .token_store()
        .set_tokens("expired.access.token", None)
        .unwrap();

    let err = client.get("/projects").await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::AuthExpiredNoRefresh);
    assert_eq!(server.refresh_calls(), 0);
    assert!(!client.token_store().has_credentials());
    assert_eq!(notifier.emitted(), 1);
}

#[tokio::test]
async fn test_legacy_token_is_read_and_migrated() {
    let server = TestServer::start().await;
    let (seed, _notifier) = server.logged_in_client().await;
    let access = seed.token_store().access_token().unwrap();
    let refresh = seed.token_store().refresh_token().unwrap();

    let storage = Arc::new(MemoryStore::new());
    storage.set("authToken", &access).unwrap();
    storage.set("refresh_token", &refresh).unwrap();
    let (client, _notifier) = server.client_with_storage(storage.clone());

    client.get("/projects").await.unwrap();
    assert_eq!(server.refresh_calls(), 0);

    server.revoke_access();
    client.get("/projects").await.unwrap();

    assert_eq!(storage.get("authToken").unwrap(), None);
    assert_eq!(
        storage.get("access_token").unwrap(),
        Some(server.valid_access())
    );
}
