//! Gateway configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate from
//! optional TOML files and `AUTHGATE_`-prefixed environment variables.
//! Every field has a default, so an empty configuration is valid.

pub mod client;
pub mod endpoints;
pub mod logging;
pub mod refresh;
pub mod storage;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use self::client::ClientConfig;
pub use self::endpoints::EndpointsConfig;
pub use self::logging::LoggingConfig;
pub use self::refresh::RefreshConfig;
pub use self::storage::{StorageBackend, StorageConfig};

use crate::error::AppError;

/// Root gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// HTTP client settings.
    #[serde(default)]
    pub client: ClientConfig,
    /// Backend endpoint paths.
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    /// Refresh behaviour.
    #[serde(default)]
    pub refresh: RefreshConfig,
    /// Credential storage.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GatewayConfig {
    /// Load configuration.
    ///
    /// Merges `config/default` and `config/{AUTHGATE_ENV}` (if present),
    /// the explicit file at `path` (required when given), and environment
    /// variables prefixed with `AUTHGATE_` using `__` as the section
    /// separator, e.g. `AUTHGATE_CLIENT__BASE_URL`.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        Self::load_with_env(path, environment())
    }

    fn load_with_env(
        path: Option<&Path>,
        environment: ::config::Environment,
    ) -> Result<Self, AppError> {
        let mut builder = ::config::Config::builder()
            .add_source(::config::File::with_name("config/default").required(false));

        if let Ok(env) = std::env::var("AUTHGATE_ENV") {
            builder = builder
                .add_source(::config::File::with_name(&format!("config/{env}")).required(false));
        }

        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }

        let config = builder
            .add_source(environment)
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}

/// `AUTHGATE_SECTION__KEY` variables: one underscore after the prefix,
/// two between nested keys.
fn environment() -> ::config::Environment {
    ::config::Environment::with_prefix("AUTHGATE")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
