//! # Coordination Errors
//!
//! Crate-level error taxonomy for session, store, and transaction
//! operations. Wire-level codes live in [`crate::service::errors`] and
//! convert into this type at the module seam.

use thiserror::Error;

use crate::service::errors::{MultiOpFailure, ServiceError};

/// Result type for coordination operations
pub type CoordResult<T> = Result<T, CoordError>;

/// Errors surfaced to callers of the coordination layer
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoordError {
    // ==================
    // Startup Errors
    // ==================

    /// A required configuration field is absent
    #[error("required configuration missing: {0}")]
    ConfigMissing(&'static str),

    /// The connection retry budget was exhausted
    #[error("could not connect to {address} after {attempts} attempts: {source}")]
    Connection {
        address: String,
        attempts: u32,
        #[source]
        source: ServiceError,
    },

    /// The service rejected the supplied credentials
    #[error("authentication rejected for scheme {scheme}")]
    AuthFailure { scheme: String },

    // ==================
    // Store Errors
    // ==================

    /// Optimistic version check failed; the node is unchanged
    #[error("version conflict on {path}: expected {expected}, actual {actual}")]
    VersionConflict {
        path: String,
        expected: i32,
        actual: i32,
    },

    /// A path is relative or malformed; never retried
    #[error("invalid path: {0:?}")]
    InvalidPath(String),

    // ==================
    // Transaction Errors
    // ==================

    /// A staged operation failed during atomic submission; no operation
    /// took effect
    #[error("transaction aborted at operation {index} ({op}): {source}")]
    MultiOpAborted {
        index: usize,
        op: &'static str,
        #[source]
        source: ServiceError,
    },

    /// Staging or commit was attempted on a committed or failed transaction
    #[error("transaction is no longer open")]
    TransactionClosed,

    // ==================
    // Lifecycle Errors
    // ==================

    /// An operation was issued against a closed or unstarted session
    #[error("session is closed")]
    SessionClosed,

    /// Any other wire-level failure, surfaced verbatim
    #[error("service error: {0}")]
    Service(#[source] ServiceError),
}

impl CoordError {
    /// Returns whether the caller can reasonably retry after re-reading
    /// state. Conflicts and aborted batches are the expected contention
    /// outcomes; everything else needs reconfiguration or escalation.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CoordError::VersionConflict { .. } | CoordError::MultiOpAborted { .. }
        )
    }
}

impl From<ServiceError> for CoordError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::BadVersion {
                path,
                expected,
                actual,
            } => CoordError::VersionConflict {
                path,
                expected,
                actual,
            },
            ServiceError::AuthFailed { scheme } => CoordError::AuthFailure { scheme },
            ServiceError::BadPath { path } => CoordError::InvalidPath(path),
            ServiceError::SessionExpired => CoordError::SessionClosed,
            other => CoordError::Service(other),
        }
    }
}

impl From<MultiOpFailure> for CoordError {
    fn from(failure: MultiOpFailure) -> Self {
        CoordError::MultiOpAborted {
            index: failure.index,
            op: failure.op,
            source: failure.source,
        }
    }
}
