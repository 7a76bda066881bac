//! Core error types.

use std::fmt;

use http::StatusCode;

/// Errors produced while handling a request.
#[derive(Debug)]
pub enum Error {
    /// No route matches the request path.
    NotFound(String),

    /// A route matches the path but not the method.
    MethodNotAllowed(String),

    /// Malformed request.
    BadRequest(String),

    /// Request exceeded its deadline.
    Timeout {
        duration_ms: u64,
    },

    /// Handler failure.
    Internal(String),

    /// A handler or interceptor panicked.
    Panic(String),

    /// I/O error.
    Io(std::io::Error),

    /// Payload serialization error.
    Json(serde_json::Error),
}

impl Error {
    /// HTTP status this error translates to.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Error::Internal(_)
            | Error::Panic(_)
            | Error::Io(_)
            | Error::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Build a panic error from a `catch_unwind` payload.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        Error::Panic(panic_message(payload.as_ref()))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound(path) => write!(f, "not found: {}", path),
            Error::MethodNotAllowed(method) => write!(f, "method not allowed: {}", method),
            Error::BadRequest(msg) => write!(f, "bad request: {}", msg),
            Error::Timeout { duration_ms } => write!(f, "request timeout after {}ms", duration_ms),
            Error::Internal(msg) => write!(f, "{}", msg),
            Error::Panic(msg) => write!(f, "handler panicked: {}", msg),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Json(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Internal(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Internal(msg.to_string())
    }
}

/// Text carried by a panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
