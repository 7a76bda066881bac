//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use super::parse::{env_duration, env_duration_required, env_or};
use super::ConfigError;

/// HTTP server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen address (LISTEN_ADDR).
    pub listen_addr: SocketAddr,
    /// Directory served under `/static` (STATIC_DOCS_ROOT).
    pub static_root: PathBuf,
    /// Per-request deadline, `None` when disabled (REQUEST_TIMEOUT).
    pub request_timeout: Option<Duration>,
    /// How long in-flight connections may finish after the listener closes (DRAIN_TIMEOUT).
    pub drain_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 9999)),
            static_root: PathBuf::from("assets/api-docs"),
            request_timeout: None,
            drain_timeout: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let addr = env_or("LISTEN_ADDR", "0.0.0.0:9999");
        let listen_addr = addr.parse().map_err(|e: std::net::AddrParseError| {
            ConfigError::Parse {
                key: "LISTEN_ADDR".into(),
                value: addr.clone(),
                error: e.to_string(),
            }
        })?;

        Ok(Self {
            listen_addr,
            static_root: PathBuf::from(env_or("STATIC_DOCS_ROOT", "assets/api-docs")),
            request_timeout: env_duration("REQUEST_TIMEOUT", "off")?,
            drain_timeout: env_duration_required("DRAIN_TIMEOUT", "10s")?,
        })
    }

    /// Use a different listen address.
    pub fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }

    /// Use a different static documents root.
    pub fn with_static_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.static_root = root.into();
        self
    }

    /// Set the per-request deadline.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }
}
