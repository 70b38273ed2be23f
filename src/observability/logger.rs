//! Structured JSON logger
//!
//! Contract:
//! - Structured logs (JSON), one log line = one event
//! - Deterministic key ordering: `event`, `severity`, `ts`, then fields
//!   sorted alphabetically
//! - Explicit severity levels; WARN and below go to stdout, ERROR and
//!   FATAL to stderr
//! - Synchronous, no buffering

use std::fmt;
use std::io::{self, Write};

use chrono::{SecondsFormat, Utc};

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Debug-level detail
    Trace = 0,
    /// Normal operations
    Info = 1,
    /// Recoverable issues
    Warn = 2,
    /// Operation failures
    Error = 3,
    /// Unrecoverable failures
    Fatal = 4,
}

impl Severity {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A structured logger that outputs JSON lines
pub struct Logger;

impl Logger {
    /// Log an event with the given severity and fields
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        Self::log_to_writer(severity, event, fields, &mut io::stdout());
    }

    /// Log to stderr
    pub fn log_stderr(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        Self::log_to_writer(severity, event, fields, &mut io::stderr());
    }

    /// Log at TRACE level
    pub fn trace(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Trace, event, fields);
    }

    /// Log at INFO level
    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    /// Log at WARN level
    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    /// Log at ERROR level
    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log_stderr(Severity::Error, event, fields);
    }

    /// Log at FATAL level
    pub fn fatal(event: &str, fields: &[(&str, &str)]) {
        Self::log_stderr(Severity::Fatal, event, fields);
    }

    fn log_to_writer<W: Write>(
        severity: Severity,
        event: &str,
        fields: &[(&str, &str)],
        writer: &mut W,
    ) {
        let mut line = String::with_capacity(256);

        line.push('{');
        line.push_str("\"event\":");
        push_json_str(&mut line, event);

        line.push_str(",\"severity\":\"");
        line.push_str(severity.as_str());
        line.push('"');

        line.push_str(",\"ts\":");
        push_json_str(
            &mut line,
            &Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        );

        // Sort fields alphabetically for deterministic output
        let mut sorted_fields: Vec<_> = fields.iter().collect();
        sorted_fields.sort_by_key(|(key, _)| *key);

        for (key, value) in sorted_fields {
            line.push(',');
            push_json_str(&mut line, key);
            line.push(':');
            push_json_str(&mut line, value);
        }

        line.push('}');
        line.push('\n');

        // One write, one flush; a failed log line must not fail the caller
        let _ = writer.write_all(line.as_bytes());
        let _ = writer.flush();
    }
}

/// Append a JSON-escaped string literal
fn push_json_str(line: &mut String, value: &str) {
    match serde_json::to_string(value) {
        Ok(encoded) => line.push_str(&encoded),
        Err(_) => line.push_str("\"\""),
    }
}

#[cfg(test)]
fn capture(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
    let mut buffer = Vec::new();
    Logger::log_to_writer(severity, event, fields, &mut buffer);
    String::from_utf8(buffer).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Trace < Severity::Info);
        assert!(Severity::Info < Severity::Warn);
        assert!(Severity::Warn < Severity::Error);
        assert!(Severity::Error < Severity::Fatal);
    }

    #[test]
    fn test_log_line_is_valid_json() {
        let output = capture(Severity::Info, "SESSION_STARTED", &[("address", "zk:2181")]);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["event"], "SESSION_STARTED");
        assert_eq!(parsed["severity"], "INFO");
        assert_eq!(parsed["address"], "zk:2181");
        assert!(parsed["ts"].is_string());
    }

    #[test]
    fn test_fields_sorted_alphabetically() {
        let output = capture(
            Severity::Warn,
            "CONNECT_RETRY",
            &[("zebra", "z"), ("alpha", "a")],
        );
        let alpha = output.find("\"alpha\"").unwrap();
        let zebra = output.find("\"zebra\"").unwrap();
        assert!(alpha < zebra);
    }

    #[test]
    fn test_values_are_escaped() {
        let output = capture(
            Severity::Info,
            "TXN_ABORTED",
            &[("reason", "bad \"path\"\nnewline")],
        );
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["reason"], "bad \"path\"\nnewline");
    }

    #[test]
    fn test_one_line_per_event() {
        let output = capture(Severity::Info, "SESSION_CLOSED", &[]);
        assert_eq!(output.matches('\n').count(), 1);
        assert!(output.ends_with('\n'));
    }
}
