//! # authgate
//!
//! Authenticated request gateway: attaches bearer credentials, turns an
//! authorization failure into one coordinated token refresh and a replay,
//! refreshes ahead of expiry, and signals when the user must sign in again.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use authgate::{AuthClient, GatewayConfig, SessionService};
//!
//! # async fn run() -> authgate::AppResult<()> {
//! let config = GatewayConfig::load(None)?;
//! let client = Arc::new(AuthClient::builder(config).build()?);
//!
//! SessionService::new(client.clone())
//!     .login("ada@example.com", "correct horse")
//!     .await?;
//!
//! let monitor = client.monitor();
//! monitor.start();
//!
//! let projects = client.get("/projects").await?;
//! println!("{}", projects.status);
//! # Ok(())
//! # }
//! ```

pub use authgate_auth::{FileStore, MemoryStore, TokenClaims, TokenKeys, TokenStore};
pub use authgate_client::{
    ApiRequest, ApiResponse, AuthClient, AuthClientBuilder, AuthSession, ReauthHandler,
    ReauthNotifier, ReauthReason, RefreshCoordinator, RefreshMonitor, RefreshTrigger,
    RequestInterceptor, ReqwestTransport, SessionService, TickDecision, TickOutcome, Transport,
};
pub use authgate_core::config::GatewayConfig;
pub use authgate_core::error::{AppError, ErrorKind};
pub use authgate_core::result::AppResult;
pub use authgate_core::traits::KeyValueStore;
