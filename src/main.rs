use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};

use championship::config::{Config, LoggingConfig};
use championship::logging::{init_subscriber, Logger};
use championship::observability::Telemetry;
use championship::{lifecycle, PKG_VERSION};

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let started = Instant::now();

    // Logger comes first so every later failure is reported
    let logging = LoggingConfig::from_env()?;
    init_subscriber(&logging)?;

    info!("Starting championship {}...", PKG_VERSION);

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    config.log_summary();

    // The OTLP exporter uses a blocking HTTP client, which must be built
    // outside the async runtime.
    let telemetry = Telemetry::init(&config.telemetry).map_err(|e| {
        error!("Failed to initialize tracer provider: {}", e);
        e
    })?;
    let telemetry = Arc::new(telemetry);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let logger = Logger::tracing(config.logging.caller);
    let exit_grace = config.telemetry.shutdown_timeout;

    let result = runtime.block_on(async move {
        info!("Championships app initialized in {:?}", started.elapsed());
        lifecycle::run(&config.server, telemetry, logger, lifecycle::shutdown_signal()).await
    });

    // Leftover blocking tasks must not hold the process past the tracer deadline
    runtime.shutdown_timeout(exit_grace);
    result?;

    info!("Shutdown complete");
    Ok(())
}
