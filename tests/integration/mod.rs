//! Integration tests for championship
//!
//! Each test starts the full request pipeline in-process on an ephemeral
//! port, with spans captured by an in-memory exporter and log records by a
//! memory sink.
//!
//! Run with: cargo test --test integration

mod helpers;

mod endpoints;
mod request_logging;
mod request_spans;
mod startup_shutdown;
mod static_files;
