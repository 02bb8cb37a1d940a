//! Credential storage configuration.

use serde::{Deserialize, Serialize};

/// Which key-value backend holds the credential pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Process memory; credentials are lost on exit.
    Memory,
    /// A JSON file on disk.
    File,
}

/// Credential storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage backend.
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    /// Path of the credential file for the `file` backend.
    #[serde(default = "default_path")]
    pub path: String,
    /// Canonical key for the access token. All writes go here.
    #[serde(default = "default_access_key")]
    pub access_token_key: String,
    /// Older access token keys, consulted in order on read only.
    #[serde(default = "default_legacy_keys")]
    pub legacy_access_token_keys: Vec<String>,
    /// Key for the refresh token.
    #[serde(default = "default_refresh_key")]
    pub refresh_token_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_path(),
            access_token_key: default_access_key(),
            legacy_access_token_keys: default_legacy_keys(),
            refresh_token_key: default_refresh_key(),
        }
    }
}

fn default_backend() -> StorageBackend {
    StorageBackend::File
}

fn default_path() -> String {
    "data/credentials.json".to_string()
}

fn default_access_key() -> String {
    "access_token".to_string()
}

fn default_legacy_keys() -> Vec<String> {
    vec!["token".to_string(), "authToken".to_string()]
}

fn default_refresh_key() -> String {
    "refresh_token".to_string()
}
