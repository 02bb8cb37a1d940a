//! Backend endpoint paths.

use serde::{Deserialize, Serialize};

/// Paths of the authentication endpoints, relative to the base URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    /// Token refresh endpoint.
    #[serde(default = "default_refresh")]
    pub refresh: String,
    /// Login endpoint (public).
    #[serde(default = "default_login")]
    pub login: String,
    /// Registration endpoint (public).
    #[serde(default = "default_register")]
    pub register: String,
    /// Password reset request endpoint (public).
    #[serde(default = "default_forgot_password")]
    pub forgot_password: String,
    /// Password reset confirmation endpoint (public).
    #[serde(default = "default_reset_password")]
    pub reset_password: String,
    /// Logout endpoint (authenticated).
    #[serde(default = "default_logout")]
    pub logout: String,
}

impl EndpointsConfig {
    /// Endpoints that never receive a bearer credential.
    pub fn public_paths(&self) -> Vec<String> {
        vec![
            self.login.clone(),
            self.register.clone(),
            self.forgot_password.clone(),
            self.reset_password.clone(),
        ]
    }
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            refresh: default_refresh(),
            login: default_login(),
            register: default_register(),
            forgot_password: default_forgot_password(),
            reset_password: default_reset_password(),
            logout: default_logout(),
        }
    }
}

fn default_refresh() -> String {
    "/auth/refresh".to_string()
}

fn default_login() -> String {
    "/auth/login".to_string()
}

fn default_register() -> String {
    "/auth/register".to_string()
}

fn default_forgot_password() -> String {
    "/auth/forgot-password".to_string()
}

fn default_reset_password() -> String {
    "/auth/reset-password".to_string()
}

fn default_logout() -> String {
    "/auth/logout".to_string()
}
