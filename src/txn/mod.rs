//! # Fenced Transactions
//!
//! Stages an ordered sequence of node mutations and applies them as one
//! atomic multi-operation batch, bracketed by a fencing marker: the batch's
//! first operation creates the marker node, its last operation (appended at
//! commit) deletes it. A marker that already exists when the batch is
//! applied fails the create and aborts the whole batch, which gives
//! exactly-one-winner semantics for writers whose submission windows
//! overlap on the same marker path.
//!
//! Because both marker operations ride inside the same atomic request, the
//! exclusion window is the server-side duration of batch application, not
//! the local staging time: coordinators sharing a marker path may stage
//! freely and only race at [`FencedTransaction::commit`].

use crate::acl::Acl;
use crate::errors::{CoordError, CoordResult};
use crate::observability::Logger;
use crate::service::{CreateMode, Op};
use crate::session::Session;
use crate::store::paths;

/// Lifecycle of a fenced transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    /// Accepting staged operations.
    Open,
    /// Committed; the batch was applied in full. Terminal.
    Committed,
    /// A commit attempt failed; nothing was applied. Terminal.
    Failed,
}

/// A fencing marker: the path all cooperating writers of one logical
/// resource agree on, plus the grants its node is created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fence {
    /// Marker node path.
    pub path: String,
    /// Grants for the marker node.
    pub acl: Vec<Acl>,
}

impl Fence {
    /// Create a fence.
    pub fn new(path: impl Into<String>, acl: Vec<Acl>) -> Self {
        Self {
            path: path.into(),
            acl,
        }
    }
}

/// A fenced, atomic multi-operation transaction.
///
/// Owns its staged operation sequence exclusively; the sequence is
/// append-only while the transaction is open and consumed exactly once by
/// [`FencedTransaction::commit`].
#[derive(Debug)]
pub struct FencedTransaction {
    session: Session,
    marker_path: String,
    ops: Vec<Op>,
    state: TxnState,
}

impl FencedTransaction {
    /// Open a transaction fenced on `fence`.
    ///
    /// Stages the marker create (empty payload, persistent) as the first
    /// operation; nothing is sent to the service until `commit`.
    ///
    /// Fencing is only meaningful if every cooperating writer of the same
    /// logical resource uses the same marker path. That agreement is a hard
    /// requirement on callers; the coordinator has no way to verify it.
    pub fn begin(session: &Session, fence: &Fence) -> CoordResult<Self> {
        paths::validate(&fence.path)?;
        // Fail fast on a closed session rather than at commit time.
        session.connection()?;
        let marker_create = Op::Create {
            path: fence.path.clone(),
            data: Vec::new(),
            acl: fence.acl.clone(),
            mode: CreateMode::Persistent,
        };
        Ok(Self {
            session: session.clone(),
            marker_path: fence.path.clone(),
            ops: vec![marker_create],
            state: TxnState::Open,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TxnState {
        self.state
    }

    /// The marker path this transaction is fenced on.
    pub fn marker_path(&self) -> &str {
        &self.marker_path
    }

    /// Number of staged operations, the marker create included.
    pub fn staged_ops(&self) -> usize {
        self.ops.len()
    }

    /// Stage a node create.
    pub fn stage_create(
        &mut self,
        path: &str,
        data: &[u8],
        acl: &[Acl],
        mode: CreateMode,
    ) -> CoordResult<()> {
        self.ensure_open()?;
        paths::validate(path)?;
        self.ops.push(Op::Create {
            path: path.to_string(),
            data: data.to_vec(),
            acl: acl.to_vec(),
            mode,
        });
        Ok(())
    }

    /// Stage a node delete.
    pub fn stage_delete(&mut self, path: &str) -> CoordResult<()> {
        self.ensure_open()?;
        paths::validate(path)?;
        self.ops.push(Op::Delete {
            path: path.to_string(),
        });
        Ok(())
    }

    /// Stage a payload replacement guarded by `version` (`-1` matches any).
    pub fn stage_set_data(&mut self, path: &str, data: &[u8], version: i32) -> CoordResult<()> {
        self.ensure_open()?;
        paths::validate(path)?;
        self.ops.push(Op::SetData {
            path: path.to_string(),
            data: data.to_vec(),
            version,
        });
        Ok(())
    }

    /// Append the marker delete and submit the batch atomically.
    ///
    /// On success every staged operation's effect becomes visible at once;
    /// on any failure none do, and the error is surfaced verbatim. Either
    /// way the staged batch is consumed and the transaction is terminal:
    /// retrying a conflict means building a fresh transaction.
    pub fn commit(&mut self) -> CoordResult<()> {
        self.ensure_open()?;
        let mut ops = std::mem::take(&mut self.ops);
        ops.push(Op::Delete {
            path: self.marker_path.clone(),
        });
        let op_count = ops.len().to_string();

        let result = match self.session.connection() {
            Ok(connection) => connection.multi(ops).map_err(CoordError::from),
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => {
                self.state = TxnState::Committed;
                Logger::trace(
                    "TXN_COMMITTED",
                    &[
                        ("marker", self.marker_path.as_str()),
                        ("ops", op_count.as_str()),
                    ],
                );
                Ok(())
            }
            Err(err) => {
                self.state = TxnState::Failed;
                let reason = err.to_string();
                Logger::warn(
                    "TXN_ABORTED",
                    &[
                        ("marker", self.marker_path.as_str()),
                        ("reason", reason.as_str()),
                    ],
                );
                Err(err)
            }
        }
    }

    fn ensure_open(&self) -> CoordResult<()> {
        if self.state == TxnState::Open {
            Ok(())
        } else {
            Err(CoordError::TransactionClosed)
        }
    }
}
