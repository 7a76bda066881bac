//! Core types for HTTP request/response handling.
//!
//! This module provides the fundamental types used throughout the interceptor
//! chain and request handlers:
//!
//! - [`Request`] - HTTP request abstraction
//! - [`Response`] - HTTP response abstraction with builder pattern
//! - [`Context`] - Request context carrying the active span and route
//! - [`Error`] - Core error types
//!
//! # Example
//!
//! ```rust,ignore
//! use championship::core::{Context, Request, Response, Result};
//!
//! async fn handle(req: Request, ctx: &mut Context) -> Result<Response> {
//!     let id = ctx.param("id").unwrap_or("?");
//!     Ok(Response::ok(format!("{} {}", req.path(), id)))
//! }
//! ```

mod context;
mod error;
mod request;
mod response;

pub use context::{Context, HttpVersion, RouteMatch};
pub use error::{panic_message, Error, Result};
pub use request::Request;
pub use response::{Response, ResponseBuilder};
