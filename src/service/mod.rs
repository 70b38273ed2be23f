//! # Coordination-Service Abstraction
//!
//! The wire protocol of the underlying coordination service is a black box
//! behind two capability traits: a [`Connector`] opens sessions, a
//! [`Connection`] carries node operations. The crate assumes the service is
//! strongly consistent and applies [`Connection::multi`] batches atomically;
//! building that guarantee is the service's job, not this crate's.
//!
//! One implementation ships in-tree: the deterministic in-memory
//! [`MemoryEnsemble`], which backs every test and doubles as an embedded
//! single-process backend.

pub mod errors;
mod memory;

pub use errors::{MultiOpFailure, ServiceError, ServiceResult};
pub use memory::MemoryEnsemble;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::acl::Acl;

/// Node persistence mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreateMode {
    /// The node survives the creating session.
    #[default]
    Persistent,
    /// The node is removed when the creating session closes.
    Ephemeral,
}

/// Metadata for a node, captured at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStat {
    /// Monotonically increasing data version; starts at 0 on create.
    pub version: i32,
    /// Payload size in bytes.
    pub data_length: usize,
    /// Number of direct children.
    pub num_children: usize,
}

/// A single mutation inside an atomic multi-operation batch.
///
/// Immutable once constructed; the transaction coordinator stages these in
/// call order and submits the whole sequence at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    /// Create a node.
    Create {
        path: String,
        data: Vec<u8>,
        acl: Vec<Acl>,
        mode: CreateMode,
    },
    /// Delete a childless node.
    Delete { path: String },
    /// Replace a node's payload, guarded by an expected version
    /// (`-1` matches any).
    SetData {
        path: String,
        data: Vec<u8>,
        version: i32,
    },
}

impl Op {
    /// The path this operation targets.
    pub fn path(&self) -> &str {
        match self {
            Op::Create { path, .. } | Op::Delete { path } | Op::SetData { path, .. } => path,
        }
    }

    /// Operation name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Op::Create { .. } => "create",
            Op::Delete { .. } => "delete",
            Op::SetData { .. } => "set_data",
        }
    }
}

/// An authentication pair presented to the service at session setup.
///
/// The credential bytes are opaque to this crate; an external resolver
/// produces them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthCredential {
    /// Authentication scheme (`digest`, `sasl`, ...)
    pub scheme: String,
    /// Scheme-specific credential bytes
    pub credential: Vec<u8>,
}

impl AuthCredential {
    /// Create an auth pair.
    pub fn new(scheme: impl Into<String>, credential: Vec<u8>) -> Self {
        Self {
            scheme: scheme.into(),
            credential,
        }
    }
}

/// Explicit secure-login context handed to a connector.
///
/// Carried as a plain value so no process-global login state is mutated;
/// two sessions with different contexts cannot interfere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaslContext {
    /// Principal the service itself authenticates as, if pinned.
    pub service_principal: Option<String>,
    /// Client principal to log in with.
    pub client_principal: String,
    /// Path to the client keytab.
    pub keytab: String,
}

/// One open session's view of the coordination service.
///
/// All calls are synchronous and safe to issue from multiple threads.
/// Implementations must apply [`Connection::multi`] atomically: either every
/// operation in the batch takes effect or none does, and no intermediate
/// state is ever observable.
pub trait Connection: Send + Sync {
    /// Create a node. The parent must already exist.
    fn create(&self, path: &str, data: &[u8], acl: &[Acl], mode: CreateMode) -> ServiceResult<()>;

    /// Delete a childless node.
    fn delete(&self, path: &str) -> ServiceResult<()>;

    /// Replace a node's payload if `version` matches (or is `-1`).
    fn set_data(&self, path: &str, data: &[u8], version: i32) -> ServiceResult<NodeStat>;

    /// Read a node's payload and metadata.
    fn get_data(&self, path: &str) -> ServiceResult<(Vec<u8>, NodeStat)>;

    /// List the names of a node's direct children. Names are unique; no
    /// ordering is defined.
    fn get_children(&self, path: &str) -> ServiceResult<Vec<String>>;

    /// Return the node's metadata, or `None` if the path is absent.
    fn exists(&self, path: &str) -> ServiceResult<Option<NodeStat>>;

    /// Read a node's grant list.
    fn get_acl(&self, path: &str) -> ServiceResult<Vec<Acl>>;

    /// Apply an ordered batch of mutations atomically.
    fn multi(&self, ops: Vec<Op>) -> Result<(), MultiOpFailure>;

    /// Release the session. Idempotent; ephemeral nodes owned by this
    /// connection are removed.
    fn close(&self);
}

/// Capability for opening sessions: the pluggable session factory.
///
/// The session manager is generic over this trait; deployments supply their
/// own connector for a real ensemble and receive the address, timeout,
/// merged auth pairs, and resolved SASL context without any global state.
pub trait Connector {
    /// Open a session against the ensemble at `address`.
    fn connect(
        &self,
        address: &str,
        session_timeout: Duration,
        auths: &[AuthCredential],
        sasl: Option<&SaslContext>,
    ) -> ServiceResult<Arc<dyn Connection>>;
}
