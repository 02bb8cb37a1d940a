//! Unified error types for authgate.
//!
//! Every crate maps its internal failures into [`AppError`] so that one
//! error type crosses the gateway boundary. The four refresh-related kinds
//! are the ones callers are expected to match on.

use std::fmt;
use thiserror::Error;

/// Error kind categorization used across the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// A refresh was needed but no refresh token was stored. Forces logout.
    AuthExpiredNoRefresh,
    /// The refresh call failed at the network level or was rejected by the
    /// server. Forces logout.
    RefreshNetworkFailure,
    /// The refresh call succeeded but returned an unusable payload. Forces
    /// logout.
    RefreshInvalidResponse,
    /// The request was rejected again after one refresh and replay.
    RequestFailedAfterRetry,
    /// Credentials were rejected or changed underneath an operation.
    Authentication,
    /// The backend answered a public endpoint with a non-success status.
    Rejected,
    /// The HTTP transport failed (connect, timeout, body read).
    Transport,
    /// The caller aborted the request.
    Cancelled,
    /// Caller-supplied input was malformed.
    InvalidInput,
    /// A configuration error occurred.
    Configuration,
    /// The key-value storage backend failed.
    Storage,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// An internal error occurred.
    Internal,
}

impl ErrorKind {
    /// Whether this kind ends the session and clears stored credentials.
    pub fn forces_reauthentication(&self) -> bool {
        matches!(
            self,
            Self::AuthExpiredNoRefresh | Self::RefreshNetworkFailure | Self::RefreshInvalidResponse
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthExpiredNoRefresh => write!(f, "AUTH_EXPIRED_NO_REFRESH"),
            Self::RefreshNetworkFailure => write!(f, "REFRESH_NETWORK_FAILURE"),
            Self::RefreshInvalidResponse => write!(f, "REFRESH_INVALID_RESPONSE"),
            Self::RequestFailedAfterRetry => write!(f, "REQUEST_FAILED_AFTER_RETRY"),
            Self::Authentication => write!(f, "AUTHENTICATION"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Transport => write!(f, "TRANSPORT"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::InvalidInput => write!(f, "INVALID_INPUT"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Storage => write!(f, "STORAGE"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// The unified error used throughout authgate.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn auth_expired_no_refresh(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthExpiredNoRefresh, message)
    }

    pub fn refresh_network_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RefreshNetworkFailure, message)
    }

    pub fn refresh_invalid_response(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RefreshInvalidResponse, message)
    }

    pub fn request_failed_after_retry(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RequestFailedAfterRetry, message)
    }

    /// Create an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    /// Create a rejected-request error.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Rejected, message)
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    /// Create a cancellation error.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, message)
    }

    /// Create an invalid-input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Returns `true` if this error is of the given kind.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

// One refresh outcome is fanned out to every queued waiter, so errors must
// be cloneable. The source chain is not.
impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Storage, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("Request timed out: {err}")
        } else if err.is_connect() {
            format!("Connection failed: {err}")
        } else {
            format!("HTTP transport error: {err}")
        };
        Self::with_source(ErrorKind::Transport, message, err)
    }
}
