//! Process-wide subscriber setup and the JSON line format.
//!
//! JSON format:
//! ```json
//! {"ts":"2024-12-28T15:04:05.123456Z","level":"debug","type":"access","msg":"<<< GET /health","caller":"src/middleware/access_log.rs:97","data":{"status":200}}
//! ```

use std::collections::HashMap;

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::{Directive, EnvFilter};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{Layer, Registry};

use crate::config::{LogFormat, LoggingConfig};

/// Crates whose own logging would feed back into the exporter or drown
/// request logs. Silenced unless the filter names them explicitly.
const NOISY_TARGETS: &[&str] = &["hyper", "h2", "reqwest", "opentelemetry"];

/// Install the global `tracing` subscriber described by `config`.
///
/// Fails if a global subscriber is already installed.
pub fn init_subscriber(config: &LoggingConfig) -> Result<(), TryInitError> {
    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Text => tracing_subscriber::fmt::layer().boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .event_format(JsonFormatter::new(crate::SERVICE_NAME))
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(build_filter(&config.filter))
        .try_init()
}

fn build_filter(spec: &str) -> EnvFilter {
    let mut filter = EnvFilter::try_new(spec).unwrap_or_else(|err| {
        eprintln!("Warning: invalid log filter '{}': {}", spec, err);
        EnvFilter::new("info")
    });

    for target in NOISY_TARGETS {
        if spec.contains(target) {
            continue;
        }
        if let Ok(directive) = format!("{}=off", target).parse::<Directive>() {
            filter = filter.add_directive(directive);
        }
    }
    filter
}

/// JSON-lines formatter for tracing events.
pub struct JsonFormatter {
    service_name: String,
}

impl JsonFormatter {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }
}

impl<S, N> FormatEvent<S, N> for JsonFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        let level = match *meta.level() {
            Level::TRACE | Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };

        let log_type = if meta.target() == "access" {
            "access"
        } else {
            "app"
        };

        let mut visitor = FieldVisitor::new();
        event.record(&mut visitor);

        let mut ts = String::new();
        let _ = SystemTime.format_time(&mut Writer::new(&mut ts));

        // Request records carry their structured fields pre-encoded
        let mut data = serde_json::Map::new();
        let mut caller = None;
        for (key, value) in visitor.fields {
            match (key.as_str(), value) {
                ("fields", serde_json::Value::String(encoded)) => {
                    match serde_json::from_str::<serde_json::Value>(&encoded) {
                        Ok(serde_json::Value::Object(map)) => data.extend(map),
                        _ => {
                            data.insert(key, serde_json::Value::String(encoded));
                        }
                    }
                }
                ("caller", value) => caller = Some(value),
                (_, value) => {
                    data.insert(key, value);
                }
            }
        }

        let mut entry = serde_json::json!({
            "ts": ts,
            "level": level,
            "type": log_type,
            "service": &self.service_name,
            "target": meta.target(),
            "msg": visitor.message.unwrap_or_default(),
            "data": data,
        });
        if let (Some(caller), Some(obj)) = (caller, entry.as_object_mut()) {
            obj.insert("caller".into(), caller);
        }

        writeln!(
            writer,
            "{}",
            serde_json::to_string(&entry).unwrap_or_default()
        )
    }
}

/// Field visitor for collecting tracing fields.
struct FieldVisitor {
    message: Option<String>,
    fields: HashMap<String, serde_json::Value>,
}

impl FieldVisitor {
    fn new() -> Self {
        Self {
            message: None,
            fields: HashMap::new(),
        }
    }
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(
                field.name().to_string(),
                serde_json::Value::String(format!("{:?}", value)),
            );
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.insert(
                field.name().to_string(),
                serde_json::Value::String(value.to_string()),
            );
        }
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.fields
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.fields
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.fields
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.fields
            .insert(field.name().to_string(), serde_json::json!(value));
    }
}
