//! Login, registration, logout, and password reset.
//!
//! These are the calls that create or end a credential pair. They go to the
//! public endpoints (logout excepted) and never trigger a refresh.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use authgate_auth::{TokenClaims, TokenStore};
use authgate_core::error::AppError;
use authgate_core::result::AppResult;

use crate::client::AuthClient;
use crate::envelope::{ApiEnvelope, TokenPayload, error_message};
use crate::request::{ApiRequest, ApiResponse};

/// A freshly established session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    /// Access token now stored.
    pub access_token: String,
    /// Refresh token now stored, if the backend issued one.
    pub refresh_token: Option<String>,
    /// Claims decoded from the access token.
    pub claims: Option<TokenClaims>,
}

/// Session operations over an [`AuthClient`].
#[derive(Debug, Clone)]
pub struct SessionService {
    client: Arc<AuthClient>,
}

impl SessionService {
    pub fn new(client: Arc<AuthClient>) -> Self {
        Self { client }
    }

    /// Signs in and stores the issued credential pair.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<AuthSession> {
        let path = self.client.config().endpoints.login.clone();
        let response = self
            .client
            .send(ApiRequest::post(path).json(json!({ "email": email, "password": password })))
            .await?;

        let session = self.establish(response, "Login")?;
        info!(sub = ?session.claims.as_ref().and_then(|c| c.sub.as_deref()), "Logged in");
        Ok(session)
    }

    /// Creates an account and stores the issued credential pair.
    ///
    /// `details` is sent as-is; the backend decides which fields it needs.
    pub async fn register(&self, details: Value) -> AppResult<AuthSession> {
        let path = self.client.config().endpoints.register.clone();
        let response = self.client.send(ApiRequest::post(path).json(details)).await?;

        let session = self.establish(response, "Registration")?;
        info!("Registered and logged in");
        Ok(session)
    }

    /// Ends the session.
    ///
    /// The server is told on a best-effort basis; local tokens are cleared
    /// whatever it answers.
    pub async fn logout(&self) -> AppResult<()> {
        let store = self.client.token_store();

        if store.access_token().is_some() {
            let path = self.client.config().endpoints.logout.clone();
            let body = match store.refresh_token() {
                Some(refresh_token) => json!({ "refresh_token": refresh_token }),
                None => json!({}),
            };

            match self
                .client
                .send_without_refresh(ApiRequest::post(path).json(body))
                .await
            {
                Ok(response) if response.is_success() => {}
                Ok(response) => {
                    warn!(status = response.status.as_u16(), "Server logout was not accepted");
                }
                Err(e) => warn!(error = %e, "Server logout failed"),
            }
        }

        store.clear_tokens()?;
        info!("Logged out");
        Ok(())
    }

    /// Asks the backend to send a password reset message.
    pub async fn request_password_reset(&self, email: &str) -> AppResult<()> {
        let path = self.client.config().endpoints.forgot_password.clone();
        let response = self
            .client
            .send(ApiRequest::post(path).json(json!({ "email": email })))
            .await?;
        expect_success(&response, "Password reset request")
    }

    /// Sets a new password using a reset token.
    pub async fn reset_password(&self, token: &str, password: &str) -> AppResult<()> {
        let path = self.client.config().endpoints.reset_password.clone();
        let response = self
            .client
            .send(ApiRequest::post(path).json(json!({ "token": token, "password": password })))
            .await?;
        expect_success(&response, "Password reset")
    }

    /// Claims of the stored access token.
    pub fn current_user(&self) -> Option<TokenClaims> {
        self.client.token_store().current_claims()
    }

    /// Whether a protected request can currently succeed without logging
    /// in again: the access token is unexpired or a refresh token is
    /// stored.
    pub fn is_authenticated(&self) -> bool {
        let store = self.client.token_store();
        store
            .access_token()
            .is_some_and(|token| !TokenStore::is_expired(&token))
            || store.refresh_token().is_some()
    }

    fn establish(&self, response: ApiResponse, action: &str) -> AppResult<AuthSession> {
        if !response.is_success() {
            let message = error_message(&response.body)
                .unwrap_or_else(|| format!("{action} failed with status {}", response.status));
            return Err(AppError::authentication(message));
        }

        let tokens = response
            .json::<ApiEnvelope<TokenPayload>>()
            .ok()
            .and_then(ApiEnvelope::into_tokens)
            .ok_or_else(|| {
                AppError::authentication(format!("{action} response did not carry an access token"))
            })?;

        let store = self.client.token_store();
        store.clear_tokens()?;
        store.set_tokens(&tokens.access_token, tokens.refresh_token.as_deref())?;

        Ok(AuthSession {
            claims: TokenStore::decode_claims(&tokens.access_token),
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        })
    }
}

fn expect_success(response: &ApiResponse, action: &str) -> AppResult<()> {
    if response.is_success() {
        return Ok(());
    }
    let message = error_message(&response.body)
        .unwrap_or_else(|| format!("{action} failed with status {}", response.status));
    Err(AppError::rejected(message))
}
