//! Integration tests for the proactive refresh monitor.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;

use authgate::{AuthClient, ErrorKind, ReauthReason, RefreshMonitor, SessionService};
use helpers::{RefreshMode, TestServer, eventually, within};

const TICK: Duration = Duration::from_millis(50);

fn fast_monitor(client: &Arc<AuthClient>) -> RefreshMonitor {
    RefreshMonitor::new(
        client.coordinator().clone(),
        client.token_store().clone(),
        TICK,
        client.config().refresh.threshold_seconds,
    )
}

#[tokio::test]
async fn test_refreshes_token_near_expiry() {
    let server = TestServer::start().await;
    server.set_access_ttl(120);
    let (client, _notifier) = server.logged_in_client().await;
    let stale = client.token_store().access_token();

    // Tokens issued by the refresh are long-lived.
    server.set_access_ttl(3600);
    let monitor = fast_monitor(&client);
    assert!(monitor.start());

    eventually(|| server.refresh_calls() == 1).await;
    eventually(|| client.token_store().access_token() != stale).await;

    tokio::time::sleep(TICK * 4).await;
    assert_eq!(server.refresh_calls(), 1);
    assert!(monitor.is_running());

    assert!(monitor.stop());
}

#[tokio::test]
async fn test_fresh_token_is_left_alone() {
    let server = TestServer::start().await;
    server.set_access_ttl(3600);
    let (client, _notifier) = server.logged_in_client().await;

    let monitor = fast_monitor(&client);
    monitor.start();
    tokio::time::sleep(TICK * 5).await;

    assert_eq!(server.refresh_calls(), 0);
    assert!(monitor.is_running());
    monitor.stop();
    monitor.stop();
    assert!(!monitor.is_running());
}

#[tokio::test]
async fn test_stops_after_logout() {
    let server = TestServer::start().await;
    let (client, _notifier) = server.logged_in_client().await;

    let monitor = fast_monitor(&client);
    monitor.start();
    SessionService::new(client.clone()).logout().await.unwrap();

    eventually(|| !monitor.is_running()).await;
    assert_eq!(server.refresh_calls(), 0);
}

#[tokio::test]
async fn test_monitor_and_request_share_refresh() {
    let server = TestServer::start().await;
    server.set_access_ttl(120);
    let (client, _notifier) = server.logged_in_client().await;

    server.set_access_ttl(3600);
    server.set_refresh_delay(Duration::from_millis(300));
    server.revoke_access();

    let monitor = fast_monitor(&client);
    monitor.start();
    eventually(|| client.coordinator().is_refreshing()).await;

    // The request's 401 arrives while the proactive refresh is outstanding.
    let response = within(client.get("/projects")).await.unwrap();
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(server.refresh_calls(), 1);

    monitor.stop();
}

#[tokio::test]
async fn test_failed_proactive_refresh_signals_reauth() {
    let server = TestServer::start().await;
    server.set_access_ttl(60);
    let (client, notifier) = server.logged_in_client().await;
    let mut signals = notifier.subscribe();

    server.set_refresh_mode(RefreshMode::Fail(StatusCode::UNAUTHORIZED));
    let monitor = fast_monitor(&client);
    monitor.start();

    let reason = within(signals.recv()).await.unwrap();
    assert_eq!(
        reason,
        ReauthReason::RefreshFailed(ErrorKind::RefreshNetworkFailure)
    );
    assert!(!client.token_store().has_credentials());
    eventually(|| !monitor.is_running()).await;
    assert_eq!(server.refresh_calls(), 1);
}
