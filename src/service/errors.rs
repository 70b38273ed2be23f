//! # Wire-Level Error Codes
//!
//! Failure codes a coordination-service connection can report. The store
//! converts the expected local conditions (`NodeExists`, `NoNode`) into
//! boolean results; everything else crosses the seam into
//! [`crate::errors::CoordError`].

use thiserror::Error;

/// Result type for connection operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Failure codes reported by a coordination-service connection
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// Create targeted a path that already exists
    #[error("node already exists: {path}")]
    NodeExists { path: String },

    /// The path (or, on create, its parent) does not exist
    #[error("node does not exist: {path}")]
    NoNode { path: String },

    /// Delete targeted a node that still has children
    #[error("node has children: {path}")]
    NotEmpty { path: String },

    /// Optimistic version check failed
    #[error("bad version on {path}: expected {expected}, actual {actual}")]
    BadVersion {
        path: String,
        expected: i32,
        actual: i32,
    },

    /// The path does not name a node the service can address
    #[error("malformed path: {path:?}")]
    BadPath { path: String },

    /// The connection to the ensemble was lost; transient
    #[error("connection lost")]
    ConnectionLoss,

    /// The session has expired or was closed
    #[error("session expired")]
    SessionExpired,

    /// The service rejected the presented credentials
    #[error("authentication failed for scheme {scheme}")]
    AuthFailed { scheme: String },
}

impl ServiceError {
    /// Returns the stable string code for logging.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::NodeExists { .. } => "NODE_EXISTS",
            ServiceError::NoNode { .. } => "NO_NODE",
            ServiceError::NotEmpty { .. } => "NOT_EMPTY",
            ServiceError::BadVersion { .. } => "BAD_VERSION",
            ServiceError::BadPath { .. } => "BAD_PATH",
            ServiceError::ConnectionLoss => "CONNECTION_LOSS",
            ServiceError::SessionExpired => "SESSION_EXPIRED",
            ServiceError::AuthFailed { .. } => "AUTH_FAILED",
        }
    }

    /// Returns whether a fresh attempt can succeed without the caller
    /// changing anything. Only connection loss qualifies; the retry loop
    /// in the session manager keys off this.
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceError::ConnectionLoss)
    }
}

/// Failure of one operation inside an atomic multi-operation batch.
///
/// The batch is rejected as a whole; `index` names the first operation
/// that failed validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("operation {index} ({op}) failed: {source}")]
pub struct MultiOpFailure {
    /// Zero-based position in the submitted batch
    pub index: usize,
    /// Operation name, for logging
    pub op: &'static str,
    /// The wire-level code the operation failed with
    #[source]
    pub source: ServiceError,
}
