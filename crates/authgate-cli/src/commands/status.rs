//! Token status command.

use serde::Serialize;
use tabled::Tabled;

use authgate_auth::TokenStore;
use authgate_auth::tokens::now_seconds;
use authgate_core::config::GatewayConfig;
use authgate_core::error::AppError;

use crate::output::{self, OutputFormat};

/// Token display row
#[derive(Debug, Serialize, Tabled)]
struct TokenRow {
    /// Access or refresh
    token: String,
    /// Subject claim
    subject: String,
    /// Expiry timestamp
    expires: String,
    /// Whole minutes until expiry
    minutes_remaining: i64,
    /// Expired or unreadable
    expired: bool,
}

impl TokenRow {
    fn new(kind: &str, token: &str, now: i64) -> Self {
        let claims = TokenStore::decode_claims(token).unwrap_or_default();
        Self {
            token: kind.to_string(),
            subject: claims.sub.clone().unwrap_or_else(|| "-".to_string()),
            expires: claims
                .expires_at()
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            minutes_remaining: TokenStore::minutes_remaining_at(token, now),
            expired: TokenStore::is_expired_at(token, now),
        }
    }
}

/// Execute status
pub fn execute(config: GatewayConfig, format: OutputFormat) -> Result<(), AppError> {
    let client = super::build_client(config, None)?;
    let store = client.token_store();
    let now = now_seconds();

    let mut rows = Vec::new();
    if let Some(access) = store.access_token() {
        rows.push(TokenRow::new("access", &access, now));
    }
    if let Some(refresh) = store.refresh_token() {
        rows.push(TokenRow::new("refresh", &refresh, now));
    }

    output::print_list(&rows, format);
    Ok(())
}
