//! Bearer credential attachment.

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, HeaderValue};
use tracing::{trace, warn};

use authgate_auth::TokenStore;
use authgate_core::config::EndpointsConfig;

use crate::request::ApiRequest;

/// Attaches the current access token to every non-public request.
#[derive(Debug, Clone)]
pub struct RequestInterceptor {
    /// Source of the access token.
    store: Arc<TokenStore>,
    /// Normalized public endpoint paths.
    public_paths: Vec<String>,
    /// Path of the base URL, empty for a bare host.
    base_path: String,
}

impl RequestInterceptor {
    /// Creates an interceptor with the public paths from configuration.
    pub fn new(store: Arc<TokenStore>, endpoints: &EndpointsConfig) -> Self {
        Self::with_public_paths(store, endpoints.public_paths())
    }

    /// Creates an interceptor with an explicit allow-list.
    pub fn with_public_paths(store: Arc<TokenStore>, public_paths: Vec<String>) -> Self {
        let public_paths = public_paths
            .iter()
            .map(|p| normalize_path(p).to_string())
            .collect();
        Self {
            store,
            public_paths,
            base_path: String::new(),
        }
    }

    /// Also recognizes absolute URLs under `base_url` as public.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_path = base_path(base_url);
        self
    }

    /// Whether `path` is an authentication handshake endpoint.
    pub fn is_public(&self, path: &str) -> bool {
        let path = normalize_path(path);
        self.public_paths
            .iter()
            .any(|public| path_matches(path, public, &self.base_path))
    }

    /// Sets `Authorization: Bearer <token>` unless the path is public or no
    /// access token is stored.
    pub fn apply(&self, request: &mut ApiRequest) {
        if self.is_public(&request.path) {
            trace!(request_id = %request.id, path = %request.path, "Public endpoint, no credential attached");
            return;
        }

        match self.store.access_token() {
            Some(token) => attach_bearer(request, &token),
            None => {
                trace!(request_id = %request.id, path = %request.path, "No access token stored");
            }
        }
    }
}

/// Sets the bearer credential on `request`, replacing any existing one.
pub fn attach_bearer(request: &mut ApiRequest, token: &str) {
    match HeaderValue::from_str(&format!("Bearer {token}")) {
        Ok(mut value) => {
            value.set_sensitive(true);
            request.headers.insert(AUTHORIZATION, value);
        }
        Err(_) => {
            warn!(request_id = %request.id, "Stored access token is not a valid header value");
        }
    }
}

/// Whether the normalized `path` is `endpoint`, either relative or
/// directly under `base_path`.
pub(crate) fn path_matches(path: &str, endpoint: &str, base_path: &str) -> bool {
    let endpoint = normalize_path(endpoint);
    path == endpoint
        || (!base_path.is_empty()
            && path.strip_prefix(base_path).is_some_and(|rest| rest == endpoint))
}

/// Normalized path of `base_url`; empty when it is a bare host.
pub(crate) fn base_path(base_url: &str) -> String {
    match normalize_path(base_url) {
        "/" => String::new(),
        path => path.to_string(),
    }
}

/// Strips scheme and host, query, fragment, and trailing slashes.
pub(crate) fn normalize_path(path: &str) -> &str {
    let path = match path.find("://") {
        Some(idx) => {
            let rest = &path[idx + 3..];
            rest.find('/').map_or("/", |slash| &rest[slash..])
        }
        None => path,
    };
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}
