//! # authgate-client
//!
//! The authenticated request gateway: a client that attaches bearer
//! credentials, recovers from authorization failures with one coordinated
//! token refresh, and refreshes ahead of expiry in the background.
//!
//! ## Modules
//!
//! - `request`: request and response descriptors
//! - `transport`: the HTTP transport seam and its reqwest implementation
//! - `interceptor`: bearer credential attachment and the public allow-list
//! - `coordinator`: single-flight refresh with a waiter queue
//! - `monitor`: proactive refresh on a timer
//! - `reauth`: forced re-authentication signal
//! - `session`: login, registration, logout, and password reset
//! - `client`: the `AuthClient` facade tying it all together

pub mod client;
pub mod coordinator;
pub mod envelope;
pub mod interceptor;
pub mod monitor;
pub mod reauth;
pub mod request;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{AuthClient, AuthClientBuilder};
pub use coordinator::{RefreshCoordinator, RefreshTrigger};
pub use interceptor::RequestInterceptor;
pub use monitor::{RefreshMonitor, TickDecision, TickOutcome};
pub use reauth::{ReauthHandler, ReauthNotifier, ReauthReason};
pub use request::{ApiRequest, ApiResponse};
pub use session::{AuthSession, SessionService};
pub use transport::{ReqwestTransport, Transport};
