//! championship - Championship API with request tracing and structured logging.
//!
//! A small HTTP service whose request path is wrapped in an observability
//! pipeline: every request gets an OpenTelemetry server span, a paired
//! entry/exit log record, and handler errors are recorded on the span before
//! they are rendered.
//!
//! # Features
//!
//! - **Tracing**: OTLP/HTTP span export with W3C trace-context propagation
//! - **Access Logging**: Structured JSON records correlated by trace id
//! - **Error Recording**: Escaping errors are attached to the request span
//! - **Graceful Shutdown**: Stop accepting, drain, then flush the tracer
//!
//! # Architecture
//!
//! Every routed request flows through a fixed interceptor chain:
//!
//! - `RecoverInterceptor` - Turns handler panics into 500 responses
//! - `TracingInterceptor` - Opens and closes the server span
//! - `LoggingInterceptor` - Writes the request/response log pair
//! - `TimeoutInterceptor` - Optional per-request deadline
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use championship::{lifecycle, Config, Logger, Telemetry};
//!
//! let config = Config::from_env()?;
//! let telemetry = Arc::new(Telemetry::init(&config.telemetry)?);
//! lifecycle::run(&config.server, telemetry, Logger::tracing(false), lifecycle::shutdown_signal()).await?;
//! ```

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Service name reported in log records and trace resources.
pub const SERVICE_NAME: &str = "championship";

pub mod config;
pub mod core;
pub mod handlers;
pub mod lifecycle;
pub mod logging;
pub mod middleware;
pub mod observability;
pub mod server;

// Re-exports for convenience
pub use config::{Config, ServerConfig, TelemetryConfig};
pub use lifecycle::StartupError;
pub use logging::Logger;
pub use observability::Telemetry;
pub use server::Server;
