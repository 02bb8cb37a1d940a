//! Proactive token refresh.
//!
//! A background task that checks the access token on a fixed interval and
//! refreshes it through the shared [`RefreshCoordinator`] before it expires.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use authgate_auth::TokenStore;
use authgate_auth::tokens::now_seconds;
use authgate_core::config::RefreshConfig;
use authgate_core::error::ErrorKind;

use crate::coordinator::{RefreshCoordinator, RefreshTrigger};

/// What a tick should do with the current access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    /// No access token is stored; the monitor has nothing to do.
    Stop,
    /// The token is comfortably valid.
    Idle {
        /// Seconds until expiry.
        seconds_remaining: i64,
    },
    /// The token is expired or inside the threshold.
    Refresh {
        /// Whether the token is already expired or unreadable.
        expired: bool,
    },
}

/// Decides what to do with `token` at `now`.
///
/// A token refreshes once `seconds_remaining <= threshold_seconds`.
pub fn evaluate(token: Option<&str>, now: i64, threshold_seconds: i64) -> TickDecision {
    let Some(token) = token else {
        return TickDecision::Stop;
    };

    if TokenStore::is_expired_at(token, now) {
        return TickDecision::Refresh { expired: true };
    }

    match TokenStore::seconds_remaining_at(token, now) {
        Some(seconds) if seconds > threshold_seconds => TickDecision::Idle {
            seconds_remaining: seconds,
        },
        _ => TickDecision::Refresh { expired: false },
    }
}

/// Result of one monitor check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No access token; the loop ends.
    Stopped,
    /// Nothing to refresh yet.
    Fresh,
    /// A refresh was already outstanding.
    SkippedInFlight,
    /// The token was refreshed.
    Refreshed,
    /// The refresh failed; the coordinator has already cleared the session.
    RefreshFailed(ErrorKind),
}

/// Handle to the spawned check loop.
#[derive(Debug)]
struct MonitorTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// State shared with the spawned loop.
#[derive(Debug, Clone)]
struct MonitorCore {
    coordinator: Arc<RefreshCoordinator>,
    store: Arc<TokenStore>,
    threshold_seconds: i64,
}

impl MonitorCore {
    async fn check(&self) -> TickOutcome {
        let token = self.store.access_token();
        match evaluate(token.as_deref(), now_seconds(), self.threshold_seconds) {
            TickDecision::Stop => TickOutcome::Stopped,
            TickDecision::Idle { seconds_remaining } => {
                debug!(seconds_remaining, "Access token still fresh");
                TickOutcome::Fresh
            }
            TickDecision::Refresh { expired } => {
                if self.coordinator.is_refreshing() {
                    debug!("Refresh already in flight, skipping tick");
                    return TickOutcome::SkippedInFlight;
                }

                info!(expired, "Refreshing access token ahead of expiry");
                match self.coordinator.refresh(RefreshTrigger::Proactive).await {
                    Ok(_) => TickOutcome::Refreshed,
                    Err(e) => {
                        warn!(error = %e, "Proactive refresh failed");
                        TickOutcome::RefreshFailed(e.kind)
                    }
                }
            }
        }
    }

    async fn run(self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Refresh monitor cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    if self.check().await == TickOutcome::Stopped {
                        info!("No access token stored, refresh monitor stopping");
                        break;
                    }
                }
            }
        }
    }
}

/// Periodically refreshes the access token before it expires.
#[derive(Debug)]
pub struct RefreshMonitor {
    /// Shared with the check loop.
    core: MonitorCore,
    /// Time between checks.
    interval: Duration,
    /// Running loop, if any.
    running: Mutex<Option<MonitorTask>>,
}

impl RefreshMonitor {
    /// Creates a stopped monitor.
    pub fn new(
        coordinator: Arc<RefreshCoordinator>,
        store: Arc<TokenStore>,
        interval: Duration,
        threshold_seconds: i64,
    ) -> Self {
        Self {
            core: MonitorCore {
                coordinator,
                store,
                threshold_seconds,
            },
            interval,
            running: Mutex::new(None),
        }
    }

    /// Creates a stopped monitor from refresh configuration.
    pub fn from_config(
        coordinator: Arc<RefreshCoordinator>,
        store: Arc<TokenStore>,
        config: &RefreshConfig,
    ) -> Self {
        Self::new(
            coordinator,
            store,
            config.check_interval(),
            config.threshold_seconds,
        )
    }

    /// Interval between checks.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Starts the check loop. Returns `false` if it was already running.
    ///
    /// The first check happens one interval after starting. Must be called
    /// from within a tokio runtime.
    pub fn start(&self) -> bool {
        let mut running = self.running.lock();
        if running.as_ref().is_some_and(|task| !task.handle.is_finished()) {
            return false;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(self.core.clone().run(self.interval, cancel.clone()));
        *running = Some(MonitorTask { cancel, handle });

        info!(
            interval_secs = self.interval.as_secs(),
            threshold_secs = self.core.threshold_seconds,
            "Refresh monitor started"
        );
        true
    }

    /// Stops the check loop. Safe to call repeatedly or before `start`.
    ///
    /// Returns `true` if a running loop was stopped.
    pub fn stop(&self) -> bool {
        match self.running.lock().take() {
            Some(task) => {
                task.cancel.cancel();
                let was_running = !task.handle.is_finished();
                if was_running {
                    info!("Refresh monitor stopped");
                }
                was_running
            }
            None => false,
        }
    }

    /// Whether the check loop is running.
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Runs a single check immediately.
    pub async fn check_once(&self) -> TickOutcome {
        self.core.check().await
    }
}

impl Drop for RefreshMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.running.get_mut().take() {
            task.cancel.cancel();
        }
    }
}
