use serde::Deserialize;
use std::{env, path::PathBuf, str::FromStr, time::Duration};

use crate::error::{Error, Result};

pub const CONNECT_TIMEOUT_ENV: &str = "SFTP_GATEWAY_CONNECT_TIMEOUT";
pub const REQUEST_TIMEOUT_ENV: &str = "SFTP_GATEWAY_REQUEST_TIMEOUT";
pub const STAGING_DIR_ENV: &str = "SFTP_GATEWAY_STAGING_DIR";
pub const DEFAULT_PORT_ENV: &str = "SFTP_GATEWAY_DEFAULT_PORT";

/// Timeouts applied to a remote session
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    /// Bound for TCP connect + banner exchange, authentication, and SFTP
    /// channel setup. Each stage gets the full budget.
    pub connect_timeout_secs: u64,
    /// Maximum time to wait for the response to a single SFTP request
    pub request_timeout_secs: u64,
}

impl SessionConfig {
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GatewayConfig {
    pub session: SessionConfig,
    /// Where transfer buffers are created. Defaults to the system temp dir.
    pub staging_dir: Option<PathBuf>,
    /// Port used when a connect request does not name one
    pub default_port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            staging_dir: None,
            default_port: 22,
        }
    }
}

impl GatewayConfig {
    /// Parses a JSON document. Missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::invalid_input(format!("Invalid gateway config: {e}")))
    }

    /// Defaults overridden by `SFTP_GATEWAY_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(secs) = parse_var(&lookup, CONNECT_TIMEOUT_ENV)? {
            config.session.connect_timeout_secs = secs;
        }
        if let Some(secs) = parse_var(&lookup, REQUEST_TIMEOUT_ENV)? {
            config.session.request_timeout_secs = secs;
        }
        if let Some(port) = parse_var(&lookup, DEFAULT_PORT_ENV)? {
            config.default_port = port;
        }
        if let Some(dir) = lookup(STAGING_DIR_ENV).filter(|d| !d.is_empty()) {
            config.staging_dir = Some(PathBuf::from(dir));
        }

        Ok(config)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::invalid_input(format!("{key}={raw}: {e}"))),
    }
}
