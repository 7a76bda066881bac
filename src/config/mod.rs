//! Configuration module for championship.
//!
//! This module provides centralized configuration loading from environment variables.
//!
//! # Example
//!
//! ```rust,ignore
//! use championship::config::Config;
//!
//! let config = Config::from_env()?;
//! println!("Listen address: {}", config.server.listen_addr);
//! println!("Collector: {}", config.telemetry.endpoint);
//! ```

mod error;
mod logging;
mod parse;
mod server;
mod telemetry;

pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use parse::parse_duration;
pub use server::ServerConfig;
pub use telemetry::TelemetryConfig;

/// Complete application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Tracer provider configuration.
    pub telemetry: TelemetryConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            telemetry: TelemetryConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Print configuration summary to log.
    pub fn log_summary(&self) {
        use tracing::info;

        info!("Configuration loaded:");
        info!("  Listen: {}", self.server.listen_addr);
        info!("  Static docs: {:?}", self.server.static_root);
        info!("  Collector: {}", self.telemetry.endpoint);
        info!(
            "  Sampling: {}",
            if self.telemetry.samples_everything() {
                "always".to_string()
            } else {
                format!("ratio {}", self.telemetry.sampling_ratio)
            }
        );

        match self.server.request_timeout {
            Some(timeout) => info!("  Request timeout: {:?}", timeout),
            None => info!("  Request timeout: disabled"),
        }

        info!("  Drain timeout: {:?}", self.server.drain_timeout);
        info!(
            "  Tracer shutdown timeout: {:?}",
            self.telemetry.shutdown_timeout
        );
    }
}
