//! Distributed tracing for the request path.
//!
//! - [`Telemetry`]: tracer provider lifecycle, OTLP export and propagation
//! - [`TracingInterceptor`]: one server span per request
//! - [`SpanErrorHandler`]: records handler errors on the active span
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use championship::observability::{SpanErrorHandler, Telemetry, TracingInterceptor};
//!
//! let telemetry = Arc::new(Telemetry::init(&config)?);
//! let tracing = TracingInterceptor::new(telemetry.clone());
//! let errors = SpanErrorHandler::default();
//!
//! // ... run server ...
//!
//! telemetry.shutdown().await;
//! ```

mod error_span;
mod otel;
pub mod propagation;
mod tracing_middleware;

pub use error_span::SpanErrorHandler;
pub use otel::{ShutdownOutcome, Telemetry, TelemetryError, TelemetryState, TRACER_NAME};
pub use tracing_middleware::{record_error, span_name, TracingInterceptor};
