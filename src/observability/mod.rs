//! Observability for the coordination layer
//!
//! Structured JSON logging only: synchronous, unbuffered, deterministic key
//! ordering, one line per event. Logging is read-only and must never affect
//! the outcome of the operation being logged.

mod logger;

pub use logger::{Logger, Severity};
