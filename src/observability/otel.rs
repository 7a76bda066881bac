//! Tracer provider lifecycle and OTLP export.
//!
//! [`Telemetry`] owns the SDK tracer provider, the tracer handed to the
//! request path, and the composite propagator. It moves through
//! `initializing → active → shutting_down → shutdown`; shutdown happens
//! at most once and flushes buffered spans within a deadline.
//!
//! # Example
//!
//! ```rust,ignore
//! use championship::config::TelemetryConfig;
//! use championship::observability::Telemetry;
//!
//! let config = TelemetryConfig::from_env()?;
//! let telemetry = Telemetry::init(&config)?;
//!
//! // ... serve requests ...
//!
//! telemetry.shutdown().await;
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Duration;

use http::HeaderMap;
use opentelemetry::propagation::{TextMapCompositePropagator, TextMapPropagator};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, Context, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{
    BatchConfigBuilder, BatchSpanProcessor, Sampler, SdkTracer, SdkTracerProvider,
    TracerProviderBuilder,
};
use opentelemetry_sdk::Resource;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::propagation::{composite_propagator, HeaderExtractor, HeaderInjector};
use crate::config::{ConfigError, TelemetryConfig};

// Semantic convention keys (avoiding dependency on semconv_experimental feature)
const SERVICE_VERSION: &str = "service.version";
const DEPLOYMENT_ENVIRONMENT: &str = "deployment.environment";

/// Instrumentation scope name of the server tracer.
pub const TRACER_NAME: &str = "championship-server";

/// Set once a provider has been registered as the process-wide default.
static GLOBAL_REGISTERED: AtomicBool = AtomicBool::new(false);

/// Lifecycle state of a [`Telemetry`] instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TelemetryState {
    Initializing = 0,
    Active = 1,
    ShuttingDown = 2,
    Shutdown = 3,
}

impl TelemetryState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => TelemetryState::Initializing,
            1 => TelemetryState::Active,
            2 => TelemetryState::ShuttingDown,
            _ => TelemetryState::Shutdown,
        }
    }
}

/// Outcome of [`Telemetry::shutdown`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Buffered spans were exported.
    Flushed,
    /// The exporter reported an error while flushing.
    Failed(String),
    /// The deadline elapsed before the flush finished.
    TimedOut,
    /// Shutdown had already been requested.
    AlreadyShutdown,
}

/// Errors raised while building the tracer provider.
#[derive(Debug)]
pub enum TelemetryError {
    /// The configuration is unusable.
    Config(ConfigError),
    /// The span exporter could not be constructed.
    Exporter(String),
    /// A provider is already registered as the process-wide default.
    AlreadyInitialized,
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::Config(e) => write!(f, "telemetry configuration: {}", e),
            TelemetryError::Exporter(msg) => write!(f, "failed to build span exporter: {}", msg),
            TelemetryError::AlreadyInitialized => {
                write!(f, "a global tracer provider is already registered")
            }
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for TelemetryError {
    fn from(e: ConfigError) -> Self {
        TelemetryError::Config(e)
    }
}

/// Tracer provider, tracer and propagator for one process.
pub struct Telemetry {
    provider: SdkTracerProvider,
    tracer: SdkTracer,
    propagator: TextMapCompositePropagator,
    state: AtomicU8,
    shutdown_timeout: Duration,
}

impl Telemetry {
    /// Build the OTLP/HTTP exporter and batching provider described by `config`.
    ///
    /// When `config.register_global` is set the provider and propagator are
    /// also installed as process-wide defaults, which may happen only once.
    pub fn init(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        if config.register_global && GLOBAL_REGISTERED.swap(true, Ordering::SeqCst) {
            return Err(TelemetryError::AlreadyInitialized);
        }

        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(config.endpoint.clone())
            .with_timeout(config.export_timeout)
            .build()
            .map_err(|e| {
                if config.register_global {
                    GLOBAL_REGISTERED.store(false, Ordering::SeqCst);
                }
                TelemetryError::Exporter(e.to_string())
            })?;

        let telemetry = Self::with_batch_exporter(config, exporter);

        if config.register_global {
            global::set_tracer_provider(telemetry.provider.clone());
            global::set_text_map_propagator(composite_propagator());
        }

        info!(
            endpoint = %config.endpoint,
            service = %config.service_name,
            version = %config.service_version,
            environment = %config.environment,
            sampling = %config.sampling_ratio,
            "OpenTelemetry tracing initialized"
        );

        Ok(telemetry)
    }

    /// Build a provider that hands every finished span straight to `exporter`.
    ///
    /// Never touches the process-wide defaults.
    pub fn with_exporter<E>(config: &TelemetryConfig, exporter: E) -> Self
    where
        E: opentelemetry_sdk::trace::SpanExporter + 'static,
    {
        Self::assemble(config, SdkTracerProvider::builder().with_simple_exporter(exporter))
    }

    /// Build a batching provider over `exporter` without touching process-wide defaults.
    pub fn with_batch_exporter<E>(config: &TelemetryConfig, exporter: E) -> Self
    where
        E: opentelemetry_sdk::trace::SpanExporter + 'static,
    {
        // Export batches and the final flush run on the processor's own thread
        let batch_config = BatchConfigBuilder::default()
            .with_max_queue_size(config.max_queue_size)
            .with_max_export_batch_size(config.batch_size)
            .with_scheduled_delay(config.scheduled_delay)
            .build();
        let processor = BatchSpanProcessor::builder(exporter)
            .with_batch_config(batch_config)
            .build();
        Self::assemble(config, SdkTracerProvider::builder().with_span_processor(processor))
    }

    fn assemble(config: &TelemetryConfig, builder: TracerProviderBuilder) -> Self {
        let state = AtomicU8::new(TelemetryState::Initializing as u8);

        let resource = Resource::builder()
            .with_service_name(config.service_name.clone())
            .with_attributes([
                KeyValue::new(SERVICE_VERSION, config.service_version.clone()),
                KeyValue::new(DEPLOYMENT_ENVIRONMENT, config.environment.clone()),
            ])
            .build();

        let sampler = if config.samples_everything() {
            Sampler::AlwaysOn
        } else {
            Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(config.sampling_ratio)))
        };

        let provider = builder.with_resource(resource).with_sampler(sampler).build();
        let tracer = provider.tracer(TRACER_NAME);

        state.store(TelemetryState::Active as u8, Ordering::SeqCst);

        Self {
            provider,
            tracer,
            propagator: composite_propagator(),
            state,
            shutdown_timeout: config.shutdown_timeout,
        }
    }

    /// Tracer used to start request spans.
    pub fn tracer(&self) -> &SdkTracer {
        &self.tracer
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TelemetryState {
        TelemetryState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Whether spans are still being accepted for export.
    pub fn is_active(&self) -> bool {
        self.state() == TelemetryState::Active
    }

    /// Extract the inbound trace context (and baggage) from request headers.
    pub fn extract(&self, headers: &HeaderMap) -> Context {
        self.propagator
            .extract_with_context(&Context::new(), &HeaderExtractor(headers))
    }

    /// Write the trace context of `cx` into outbound headers.
    pub fn inject(&self, cx: &Context, headers: &mut HeaderMap) {
        self.propagator
            .inject_context(cx, &mut HeaderInjector(headers));
    }

    /// Export everything buffered so far without shutting down.
    pub async fn flush(&self) -> Result<(), String> {
        let provider = self.provider.clone();
        tokio::task::spawn_blocking(move || provider.force_flush())
            .await
            .map_err(|e| e.to_string())?
            .map_err(|e| e.to_string())
    }

    /// Flush buffered spans and shut the provider down, using the configured deadline.
    pub async fn shutdown(&self) -> ShutdownOutcome {
        self.shutdown_within(self.shutdown_timeout).await
    }

    /// Flush buffered spans and shut the provider down within `deadline`.
    ///
    /// Only the first call does any work. Failures are logged and reported
    /// through the returned outcome, never raised.
    pub async fn shutdown_within(&self, deadline: Duration) -> ShutdownOutcome {
        if self
            .state
            .compare_exchange(
                TelemetryState::Active as u8,
                TelemetryState::ShuttingDown as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            debug!("Tracer provider shutdown already requested");
            return ShutdownOutcome::AlreadyShutdown;
        }

        // SDK shutdown blocks until the batch worker has exported
        let provider = self.provider.clone();
        let flush = match spawn_detached("otel-shutdown", move || provider.shutdown()) {
            Ok(flush) => flush,
            Err(e) => {
                warn!(error = %e, "Failed to start tracer provider shutdown");
                self.state
                    .store(TelemetryState::Shutdown as u8, Ordering::SeqCst);
                return ShutdownOutcome::Failed(e.to_string());
            }
        };

        let outcome = match tokio::time::timeout(deadline, flush).await {
            Ok(Ok(Ok(()))) => {
                info!("OpenTelemetry tracing shutdown complete");
                ShutdownOutcome::Flushed
            }
            Ok(Ok(Err(e))) => {
                warn!(error = %e, "Tracer provider shutdown failed");
                ShutdownOutcome::Failed(e.to_string())
            }
            Ok(Err(_)) => {
                warn!("Tracer provider shutdown thread exited without a result");
                ShutdownOutcome::Failed("shutdown thread exited without a result".to_string())
            }
            Err(_) => {
                warn!(
                    timeout_ms = deadline.as_millis() as u64,
                    "Tracer provider shutdown timed out, buffered spans may be lost"
                );
                ShutdownOutcome::TimedOut
            }
        };

        self.state
            .store(TelemetryState::Shutdown as u8, Ordering::SeqCst);
        outcome
    }
}

/// Run blocking `work` on a named thread that is never joined.
///
/// Unlike `spawn_blocking`, an abandoned call does not keep the runtime
/// alive when it is dropped.
fn spawn_detached<T, F>(name: &str, work: F) -> std::io::Result<oneshot::Receiver<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let _ = tx.send(work());
        })?;
    Ok(rx)
}

impl fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Telemetry")
            .field("state", &self.state())
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish_non_exhaustive()
    }
}
