//! Trace export configuration.

use std::time::Duration;

use http::Uri;

use super::parse::{env_duration_required, env_opt, env_or, env_parse, env_required};
use super::ConfigError;

/// Path the OTLP/HTTP receiver listens on for spans.
const TRACES_PATH: &str = "/v1/traces";

/// Tracer provider and exporter configuration.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Collector endpoint (JAEGER_API), validated and normalized.
    pub endpoint: String,
    /// Logical service name reported in the resource.
    pub service_name: String,
    /// Service version reported in the resource.
    pub service_version: String,
    /// Deployment environment (OTEL_ENVIRONMENT).
    pub environment: String,
    /// Sampling ratio 0.0 - 1.0, 1.0 samples everything (TRACE_SAMPLING_RATIO).
    pub sampling_ratio: f64,
    /// Exporter request timeout (OTEL_EXPORT_TIMEOUT).
    pub export_timeout: Duration,
    /// Spans per export batch (OTEL_BATCH_SIZE).
    pub batch_size: usize,
    /// Batch processor queue capacity (OTEL_MAX_QUEUE_SIZE).
    pub max_queue_size: usize,
    /// Delay between scheduled batch exports.
    pub scheduled_delay: Duration,
    /// Deadline for the final flush at shutdown (TRACER_SHUTDOWN_TIMEOUT).
    pub shutdown_timeout: Duration,
    /// Register the provider and propagator as process-wide defaults.
    pub register_global: bool,
}

impl TelemetryConfig {
    /// Fixed logical service name.
    pub const SERVICE_NAME: &'static str = "championship";

    /// Create a configuration for the given endpoint with default tuning.
    ///
    /// The endpoint is validated the same way as `JAEGER_API`.
    pub fn new(endpoint: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: normalize_endpoint("JAEGER_API", endpoint)?,
            service_name: Self::SERVICE_NAME.to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
            sampling_ratio: 1.0,
            export_timeout: Duration::from_secs(10),
            batch_size: 512,
            max_queue_size: 2048,
            scheduled_delay: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(5),
            register_global: true,
        })
    }

    /// Load configuration from environment variables.
    ///
    /// A missing or malformed `JAEGER_API` is an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let endpoint = env_required("JAEGER_API")?;
        let mut config = Self::new(&endpoint)?;

        if let Some(environment) = env_opt("OTEL_ENVIRONMENT") {
            config.environment = environment;
        }
        config.service_version = env_or("OTEL_SERVICE_VERSION", env!("CARGO_PKG_VERSION"));
        config.sampling_ratio = env_parse("TRACE_SAMPLING_RATIO", 1.0)?;
        if !(0.0..=1.0).contains(&config.sampling_ratio) {
            return Err(ConfigError::Invalid {
                key: "TRACE_SAMPLING_RATIO".into(),
                message: format!("{} is outside 0.0..=1.0", config.sampling_ratio),
            });
        }
        config.export_timeout = env_duration_required("OTEL_EXPORT_TIMEOUT", "10s")?;
        config.batch_size = env_parse("OTEL_BATCH_SIZE", 512)?;
        config.max_queue_size = env_parse("OTEL_MAX_QUEUE_SIZE", 2048)?;
        if config.batch_size == 0 || config.batch_size > config.max_queue_size {
            return Err(ConfigError::Invalid {
                key: "OTEL_BATCH_SIZE".into(),
                message: format!(
                    "must be between 1 and OTEL_MAX_QUEUE_SIZE ({})",
                    config.max_queue_size
                ),
            });
        }
        config.shutdown_timeout = env_duration_required("TRACER_SHUTDOWN_TIMEOUT", "5s")?;

        Ok(config)
    }

    /// Whether every trace is sampled.
    pub fn samples_everything(&self) -> bool {
        self.sampling_ratio >= 1.0
    }
}

/// Validate a collector URL and point it at the traces receiver.
///
/// Requires an `http` or `https` scheme and a host. A bare origin gets
/// the OTLP traces path appended; an explicit path is kept as-is.
fn normalize_endpoint(key: &str, raw: &str) -> Result<String, ConfigError> {
    let invalid = |message: String| ConfigError::Invalid {
        key: key.into(),
        message,
    };

    let raw = raw.trim();
    let uri: Uri = raw
        .parse()
        .map_err(|e: http::uri::InvalidUri| invalid(format!("'{}': {}", raw, e)))?;

    match uri.scheme_str() {
        Some("http") | Some("https") => {}
        Some(other) => return Err(invalid(format!("unsupported scheme '{}'", other))),
        None => return Err(invalid(format!("'{}' has no scheme", raw))),
    }

    let host = uri.host().unwrap_or_default();
    if host.is_empty() {
        return Err(invalid(format!("'{}' has no host", raw)));
    }

    let path = uri.path();
    if path.is_empty() || path == "/" {
        Ok(format!("{}{}", raw.trim_end_matches('/'), TRACES_PATH))
    } else {
        Ok(raw.to_string())
    }
}
