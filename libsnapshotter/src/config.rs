//! Connection configuration.
//!
//! Environment variables:
//! - `CSI_ENDPOINT`: driver address, either a socket path (`/run/csi/socket`,
//!   `unix:///run/csi/socket`) or a network address (`host:port`,
//!   `http://host:port`).  Defaults to `/run/csi/socket`.
//! - `CSI_CONNECTION_TIMEOUT`: seconds to wait for the channel to become
//!   ready before handing it out anyway.  Defaults to `60`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CsiError;

/// Environment variable holding the driver address.
pub const ENDPOINT_ENV: &str = "CSI_ENDPOINT";
/// Environment variable holding the connect timeout in seconds.
pub const CONNECTION_TIMEOUT_ENV: &str = "CSI_CONNECTION_TIMEOUT";

/// Default driver address.
pub const DEFAULT_ENDPOINT: &str = "/run/csi/socket";
/// Default connect timeout.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(60);

/// Where the driver listens and how long to wait for it when connecting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Driver address.
    pub endpoint: String,
    /// Upper bound on the readiness wait in `open`.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Duration,
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECTION_TIMEOUT
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            connect_timeout: DEFAULT_CONNECTION_TIMEOUT,
        }
    }
}

impl ConnectionConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, CsiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, which maps a variable name
    /// to its value.  Unset or empty variables fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CsiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(endpoint) = non_empty(ENDPOINT_ENV) {
            config.endpoint = endpoint.trim().to_owned();
        }
        if let Some(raw) = non_empty(CONNECTION_TIMEOUT_ENV) {
            let secs: u64 = raw.trim().parse().map_err(|e| {
                CsiError::Config(format!("{CONNECTION_TIMEOUT_ENV}={raw:?}: {e}"))
            })?;
            config.connect_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}
