//! Structured request logging.
//!
//! A [`Logger`] is a cheap, clonable handle that turns leveled,
//! field-tagged records into calls on a [`LogSink`]. The default sink
//! forwards to the `tracing` facade under the `access` target, so records
//! end up wherever the process subscriber writes them (see [`init_subscriber`]).
//!
//! Sink failures never reach the caller: a record that cannot be written is
//! dropped.
//!
//! ```rust,ignore
//! use championship::logging::{Fields, Logger};
//!
//! let logger = Logger::tracing(true);
//! let mut fields = Fields::new();
//! fields.insert("status".into(), 200.into());
//! logger.debug("<<< GET /health", fields);
//! ```

mod format;

use std::fmt;
use std::panic::{AssertUnwindSafe, Location};
use std::sync::{Arc, Mutex};

use http::HeaderMap;
use serde_json::Value;

pub use format::{init_subscriber, JsonFormatter};

/// Field name → value mapping attached to a record.
pub type Fields = serde_json::Map<String, Value>;

/// Record severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured log entry.
#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord {
    pub level: Level,
    pub message: String,
    pub fields: Fields,
    /// `file:line` of the call site, when caller attachment is enabled.
    pub caller: Option<String>,
}

/// Destination for log records.
pub trait LogSink: Send + Sync {
    /// Write a record. Errors are reported but ignored by [`Logger`].
    fn emit(&self, record: &LogRecord) -> std::io::Result<()>;
}

/// Handle used by the request path to emit records.
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn LogSink>,
    caller: bool,
}

impl Logger {
    /// Create a logger over an arbitrary sink.
    pub fn new(sink: Arc<dyn LogSink>, caller: bool) -> Self {
        Self { sink, caller }
    }

    /// Logger that forwards records to the `tracing` facade.
    pub fn tracing(caller: bool) -> Self {
        Self::new(Arc::new(TracingSink), caller)
    }

    /// Logger that drops everything.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NullSink), false)
    }

    #[track_caller]
    pub fn debug(&self, message: impl Into<String>, fields: Fields) {
        self.log(Level::Debug, message, fields)
    }

    #[track_caller]
    pub fn info(&self, message: impl Into<String>, fields: Fields) {
        self.log(Level::Info, message, fields)
    }

    #[track_caller]
    pub fn warn(&self, message: impl Into<String>, fields: Fields) {
        self.log(Level::Warn, message, fields)
    }

    #[track_caller]
    pub fn error(&self, message: impl Into<String>, fields: Fields) {
        self.log(Level::Error, message, fields)
    }

    /// Emit a record at `level`.
    #[track_caller]
    pub fn log(&self, level: Level, message: impl Into<String>, fields: Fields) {
        let caller = self.caller.then(|| {
            let location = Location::caller();
            format!("{}:{}", location.file(), location.line())
        });

        let record = LogRecord {
            level,
            message: message.into(),
            fields,
            caller,
        };

        // A failing or panicking sink must not take the request down with it.
        let _ = std::panic::catch_unwind(AssertUnwindSafe(|| self.sink.emit(&record)));
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("caller", &self.caller)
            .finish_non_exhaustive()
    }
}

/// Render a header map as `{"name": ["value", ...]}`.
///
/// Values that are not valid UTF-8 are rendered lossily.
pub fn headers_to_json(headers: &HeaderMap) -> Value {
    let mut map = Fields::new();
    for name in headers.keys() {
        let values = headers
            .get_all(name)
            .iter()
            .map(|v| Value::String(String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        map.insert(name.as_str().to_string(), Value::Array(values));
    }
    Value::Object(map)
}

/// Forwards records to `tracing` with target `access`.
///
/// The structured fields travel as a single JSON-encoded `fields` value,
/// which [`JsonFormatter`] merges back into its output object.
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, record: &LogRecord) -> std::io::Result<()> {
        let fields = Value::Object(record.fields.clone());
        let caller = record.caller.as_deref();
        let message = record.message.as_str();

        match record.level {
            Level::Debug => {
                tracing::debug!(target: "access", fields = %fields, caller, "{}", message)
            }
            Level::Info => {
                tracing::info!(target: "access", fields = %fields, caller, "{}", message)
            }
            Level::Warn => {
                tracing::warn!(target: "access", fields = %fields, caller, "{}", message)
            }
            Level::Error => {
                tracing::error!(target: "access", fields = %fields, caller, "{}", message)
            }
        }
        Ok(())
    }
}

/// Discards every record.
pub struct NullSink;

impl LogSink for NullSink {
    fn emit(&self, _record: &LogRecord) -> std::io::Result<()> {
        Ok(())
    }
}

/// Keeps records in memory, for tests and diagnostics.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Records whose message equals `message`.
    pub fn with_message(&self, message: &str) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.message == message)
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut records) = self.records.lock() {
            records.clear();
        }
    }
}

impl LogSink for MemorySink {
    fn emit(&self, record: &LogRecord) -> std::io::Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| std::io::Error::other("log buffer poisoned"))?;
        records.push(record.clone());
        Ok(())
    }
}
