//! Backend response envelope.

use serde::{Deserialize, Serialize};

/// `{ success, data, message }` wrapper returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    /// Whether the backend considers the call successful.
    #[serde(default)]
    pub success: bool,
    /// Payload on success.
    pub data: Option<T>,
    /// Human-readable message, usually present on failure.
    #[serde(default)]
    pub message: Option<String>,
}

/// Credential pair issued by login, registration, or refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    /// New access token.
    pub access_token: String,
    /// Rotated refresh token; absent when the backend does not rotate.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl ApiEnvelope<TokenPayload> {
    /// Extracts a usable credential pair, or `None` when the envelope does
    /// not carry one.
    pub fn into_tokens(self) -> Option<TokenPayload> {
        if !self.success {
            return None;
        }
        self.data
            .filter(|tokens| !tokens.access_token.is_empty())
            .map(|mut tokens| {
                tokens.refresh_token = tokens.refresh_token.filter(|t| !t.is_empty());
                tokens
            })
    }
}

/// Best-effort failure message from a response body.
pub fn error_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ApiEnvelope<serde_json::Value>>(body)
        .ok()
        .and_then(|envelope| envelope.message)
}
