//! The credential pair store.
//!
//! Holds the current access/refresh token pair in a [`KeyValueStore`] and
//! derives expiry information from the access token's claims.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, warn};

use authgate_core::config::StorageConfig;
use authgate_core::result::AppResult;
use authgate_core::traits::KeyValueStore;

use super::claims::{TokenClaims, decode_claims};

/// Storage keys used by the token store.
#[derive(Debug, Clone)]
pub struct TokenKeys {
    /// Canonical access token key. All writes go here.
    pub access: String,
    /// Older access token keys, read in order when the canonical key is empty.
    pub legacy_access: Vec<String>,
    /// Refresh token key.
    pub refresh: String,
}

impl From<&StorageConfig> for TokenKeys {
    fn from(config: &StorageConfig) -> Self {
        Self {
            access: config.access_token_key.clone(),
            legacy_access: config.legacy_access_token_keys.clone(),
            refresh: config.refresh_token_key.clone(),
        }
    }
}

impl Default for TokenKeys {
    fn default() -> Self {
        Self::from(&StorageConfig::default())
    }
}

/// Durable store for the current credential pair.
///
/// Reads never fail: backend errors are logged and reported as an absent
/// token. Every write or clear bumps a generation counter so that a
/// long-running refresh can tell whether the pair changed underneath it.
pub struct TokenStore {
    /// Key-value backend.
    backend: Arc<dyn KeyValueStore>,
    /// Keys in use.
    keys: TokenKeys,
    /// Serializes writes so a pair is never interleaved with another.
    write_lock: Mutex<()>,
    /// Bumped on every `set_tokens` / `clear_tokens`.
    generation: AtomicU64,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("keys", &self.keys)
            .field("generation", &self.generation())
            .finish()
    }
}

impl TokenStore {
    /// Creates a token store over `backend` using the default keys.
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self::with_keys(backend, TokenKeys::default())
    }

    /// Creates a token store with explicit keys.
    pub fn with_keys(backend: Arc<dyn KeyValueStore>, keys: TokenKeys) -> Self {
        Self {
            backend,
            keys,
            write_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// Returns the current access token.
    ///
    /// The canonical key wins; legacy keys are only consulted when it is
    /// empty.
    pub fn access_token(&self) -> Option<String> {
        std::iter::once(&self.keys.access)
            .chain(self.keys.legacy_access.iter())
            .find_map(|key| self.read(key))
    }

    /// Returns the current refresh token.
    pub fn refresh_token(&self) -> Option<String> {
        self.read(&self.keys.refresh)
    }

    /// Whether any credential is stored.
    pub fn has_credentials(&self) -> bool {
        self.access_token().is_some() || self.refresh_token().is_some()
    }

    /// Stores a new access token and, when given, a new refresh token.
    ///
    /// Legacy access token copies are removed. Omitting the refresh token
    /// keeps the stored one, which is how a refresh without rotation is
    /// committed.
    pub fn set_tokens(&self, access_token: &str, refresh_token: Option<&str>) -> AppResult<()> {
        let _guard = self.write_lock.lock();
        self.write_pair(access_token, refresh_token)
    }

    /// Like [`set_tokens`](Self::set_tokens), but only if the store has not
    /// been written since generation `expected`. Returns whether it wrote.
    pub fn set_tokens_if_unchanged(
        &self,
        expected: u64,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> AppResult<bool> {
        let _guard = self.write_lock.lock();
        if self.generation() != expected {
            return Ok(false);
        }
        self.write_pair(access_token, refresh_token)?;
        Ok(true)
    }

    /// Removes every known token key. Safe to call when nothing is stored.
    pub fn clear_tokens(&self) -> AppResult<()> {
        let _guard = self.write_lock.lock();
        self.remove_all()
    }

    /// Like [`clear_tokens`](Self::clear_tokens), but only if the store has
    /// not been written since generation `expected`. Returns whether it
    /// cleared.
    pub fn clear_tokens_if_unchanged(&self, expected: u64) -> AppResult<bool> {
        let _guard = self.write_lock.lock();
        if self.generation() != expected {
            return Ok(false);
        }
        self.remove_all()?;
        Ok(true)
    }

    /// Current write generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Decodes the claims of the current access token.
    pub fn current_claims(&self) -> Option<TokenClaims> {
        self.access_token().as_deref().and_then(decode_claims)
    }

    /// Decodes a token's payload; `None` when malformed.
    pub fn decode_claims(token: &str) -> Option<TokenClaims> {
        decode_claims(token)
    }

    /// Whether `token` is expired now. Undecodable tokens are expired.
    pub fn is_expired(token: &str) -> bool {
        Self::is_expired_at(token, now_seconds())
    }

    /// Whether `token` is expired at `now` (seconds since epoch).
    pub fn is_expired_at(token: &str, now: i64) -> bool {
        decode_claims(token).is_none_or(|claims| claims.is_expired_at(now))
    }

    /// Whole minutes until `token` expires, rounded down; `-1` when the
    /// claims cannot be read. Negative values mean expired or unknown.
    pub fn minutes_remaining(token: &str) -> i64 {
        Self::minutes_remaining_at(token, now_seconds())
    }

    /// [`minutes_remaining`](Self::minutes_remaining) at an explicit time.
    pub fn minutes_remaining_at(token: &str, now: i64) -> i64 {
        match Self::seconds_remaining_at(token, now) {
            Some(seconds) => seconds.div_euclid(60),
            None => -1,
        }
    }

    /// Seconds until `token` expires; `None` when it has no readable `exp`.
    pub fn seconds_remaining(token: &str) -> Option<i64> {
        Self::seconds_remaining_at(token, now_seconds())
    }

    /// [`seconds_remaining`](Self::seconds_remaining) at an explicit time.
    pub fn seconds_remaining_at(token: &str, now: i64) -> Option<i64> {
        decode_claims(token).and_then(|claims| claims.seconds_remaining_at(now))
    }

    fn write_pair(&self, access_token: &str, refresh_token: Option<&str>) -> AppResult<()> {
        self.generation.fetch_add(1, Ordering::SeqCst);

        self.backend.set(&self.keys.access, access_token)?;
        let legacy: Vec<&str> = self.keys.legacy_access.iter().map(String::as_str).collect();
        self.backend.remove_many(&legacy)?;

        if let Some(refresh_token) = refresh_token {
            self.backend.set(&self.keys.refresh, refresh_token)?;
        }

        debug!(
            rotated_refresh = refresh_token.is_some(),
            "Stored credential pair"
        );
        Ok(())
    }

    fn remove_all(&self) -> AppResult<()> {
        self.generation.fetch_add(1, Ordering::SeqCst);

        let mut keys: Vec<&str> = vec![self.keys.access.as_str(), self.keys.refresh.as_str()];
        keys.extend(self.keys.legacy_access.iter().map(String::as_str));
        self.backend.remove_many(&keys)?;

        debug!("Cleared credential pair");
        Ok(())
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(key, error = %e, "Failed to read token from storage");
                None
            }
        }
    }
}

/// Current time in seconds since the epoch.
pub fn now_seconds() -> i64 {
    Utc::now().timestamp()
}
