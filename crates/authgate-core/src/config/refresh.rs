//! Token refresh configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for reactive and proactive token refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Interval between proactive monitor checks, in seconds.
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,
    /// Refresh proactively once the access token has this many seconds or
    /// fewer remaining.
    #[serde(default = "default_threshold")]
    pub threshold_seconds: i64,
    /// Response statuses treated as an authorization failure.
    #[serde(default = "default_auth_failure_statuses")]
    pub auth_failure_statuses: Vec<u16>,
}

impl RefreshConfig {
    /// Monitor check interval as a [`Duration`].
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds.max(1))
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            check_interval_seconds: default_check_interval(),
            threshold_seconds: default_threshold(),
            auth_failure_statuses: default_auth_failure_statuses(),
        }
    }
}

fn default_check_interval() -> u64 {
    60
}

fn default_threshold() -> i64 {
    300
}

fn default_auth_failure_statuses() -> Vec<u16> {
    vec![401]
}
