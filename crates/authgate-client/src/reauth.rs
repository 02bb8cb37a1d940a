//! Forced re-authentication signal.
//!
//! The gateway does not own navigation. When the credential pair can no
//! longer be renewed it clears the token store and tells a
//! [`ReauthHandler`] that the user must sign in again.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::info;

use authgate_core::error::ErrorKind;

/// Why re-authentication is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "kind")]
pub enum ReauthReason {
    /// A refresh was needed but no refresh token was stored.
    NoRefreshToken,
    /// The refresh call failed.
    RefreshFailed(ErrorKind),
    /// A request to the refresh endpoint itself was rejected.
    RefreshEndpointRejected,
}

impl fmt::Display for ReauthReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRefreshToken => write!(f, "no refresh token available"),
            Self::RefreshFailed(kind) => write!(f, "token refresh failed ({kind})"),
            Self::RefreshEndpointRejected => write!(f, "refresh endpoint rejected the request"),
        }
    }
}

/// Receives the forced re-authentication signal.
///
/// Called after the token store has been cleared.
pub trait ReauthHandler: Send + Sync + fmt::Debug + 'static {
    /// The user must authenticate again before any protected request can
    /// succeed.
    fn reauthentication_required(&self, reason: ReauthReason);
}

/// Broadcasts re-authentication signals to any number of subscribers.
#[derive(Debug)]
pub struct ReauthNotifier {
    /// Broadcast sender; a send with no subscribers is not an error.
    sender: broadcast::Sender<ReauthReason>,
    /// Signals emitted so far.
    emitted: AtomicU64,
}

impl ReauthNotifier {
    /// Creates a notifier with room for `capacity` unread signals per
    /// subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            emitted: AtomicU64::new(0),
        }
    }

    /// Subscribes to future signals.
    pub fn subscribe(&self) -> broadcast::Receiver<ReauthReason> {
        self.sender.subscribe()
    }

    /// Number of signals emitted.
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::SeqCst)
    }
}

impl Default for ReauthNotifier {
    fn default() -> Self {
        Self::new(16)
    }
}

impl ReauthHandler for ReauthNotifier {
    fn reauthentication_required(&self, reason: ReauthReason) {
        self.emitted.fetch_add(1, Ordering::SeqCst);
        info!(%reason, "Re-authentication required");
        let _ = self.sender.send(reason);
    }
}
