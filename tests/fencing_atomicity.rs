//! Fencing and Atomicity Invariant Tests
//!
//! Tests for the fenced transaction core:
//! - All-or-nothing application of staged batches
//! - Marker bracketing (created first, deleted last, absent afterwards)
//! - Exactly-one-winner semantics under overlapping submission windows
//! - Terminal transaction states

use std::sync::{Arc, Barrier};
use std::time::Duration;

use cordon::acl::Acl;
use cordon::config::CoordConfig;
use cordon::errors::CoordError;
use cordon::service::{
    AuthCredential, Connection, Connector, CreateMode, MemoryEnsemble, MultiOpFailure, NodeStat,
    Op, SaslContext, ServiceError, ServiceResult,
};
use cordon::session::{Session, SessionManager};
use cordon::store::PathStore;
use cordon::txn::{Fence, FencedTransaction, TxnState};

fn open_acl() -> Vec<Acl> {
    vec![Acl::world_anyone()]
}

fn lock_fence() -> Fence {
    Fence::new("/lock", open_acl())
}

fn session_on(ensemble: &MemoryEnsemble) -> Session {
    SessionManager::with_connector(CoordConfig::with_address("ensemble:2181"), ensemble.clone())
        .start()
        .expect("session start")
}

// =============================================================================
// Commit Semantics
// =============================================================================

/// The scenario from the protocol description: a fenced create lands, the
/// marker is gone afterwards, and a strictly-later coordinator reusing the
/// marker path succeeds.
#[test]
fn test_fenced_create_then_sequential_reuse() {
    let ensemble = MemoryEnsemble::new();
    let session = session_on(&ensemble);
    let store = PathStore::new(session.clone());
    store.create("/data", &open_acl()).unwrap();

    let mut first = FencedTransaction::begin(&session, &lock_fence()).unwrap();
    first
        .stage_create("/data/x", b"v1", &open_acl(), CreateMode::Persistent)
        .unwrap();
    first.commit().unwrap();

    assert_eq!(store.get_string("/data/x").unwrap().unwrap(), "v1");
    assert!(!store.exists("/lock").unwrap());

    // Strictly after the first commit completes, the same marker path is
    // free for the next writer.
    let mut second = FencedTransaction::begin(&session, &lock_fence()).unwrap();
    second
        .stage_create("/data/y", b"v2", &open_acl(), CreateMode::Persistent)
        .unwrap();
    second.commit().unwrap();

    assert_eq!(store.get_string("/data/y").unwrap().unwrap(), "v2");
    assert!(!store.exists("/lock").unwrap());
}

/// Every staged operation's effect appears at once on success.
#[test]
fn test_commit_applies_all_effects_simultaneously() {
    let ensemble = MemoryEnsemble::new();
    let session = session_on(&ensemble);
    let store = PathStore::new(session.clone());
    store.create("/data", &open_acl()).unwrap();
    store.create("/data/old", &open_acl()).unwrap();
    store.create("/data/versioned", &open_acl()).unwrap();

    let mut txn = FencedTransaction::begin(&session, &lock_fence()).unwrap();
    txn.stage_create("/data/new", b"n", &open_acl(), CreateMode::Persistent)
        .unwrap();
    txn.stage_set_data("/data/versioned", b"updated", 0).unwrap();
    txn.stage_delete("/data/old").unwrap();
    txn.commit().unwrap();

    assert!(store.exists("/data/new").unwrap());
    assert!(!store.exists("/data/old").unwrap());
    let (data, stat) = store.get_data_with_stat("/data/versioned").unwrap().unwrap();
    assert_eq!(data, b"updated");
    assert_eq!(stat.version, 1);
    assert!(!store.exists("/lock").unwrap());
}

/// A marker that already exists at submission time aborts the whole batch
/// before any operation takes effect.
#[test]
fn test_marker_collision_aborts_whole_batch() {
    let ensemble = MemoryEnsemble::new();
    let session = session_on(&ensemble);
    let store = PathStore::new(session.clone());
    store.create("/data", &open_acl()).unwrap();
    store.create("/lock", &open_acl()).unwrap();

    let mut txn = FencedTransaction::begin(&session, &lock_fence()).unwrap();
    txn.stage_create("/data/z", b"z", &open_acl(), CreateMode::Persistent)
        .unwrap();
    let err = txn.commit().unwrap_err();

    assert_eq!(
        err,
        CoordError::MultiOpAborted {
            index: 0,
            op: "create",
            source: ServiceError::NodeExists {
                path: "/lock".to_string()
            },
        }
    );
    assert!(err.is_recoverable());
    assert!(!store.exists("/data/z").unwrap());
    // The pre-existing marker is untouched.
    assert!(store.exists("/lock").unwrap());
}

/// A failure in the middle of the batch leaves every touched path
/// unchanged, including operations staged before the failing one.
#[test]
fn test_mid_batch_failure_applies_nothing() {
    let ensemble = MemoryEnsemble::new();
    let session = session_on(&ensemble);
    let store = PathStore::new(session.clone());
    store.create("/data", &open_acl()).unwrap();
    store.create("/data/a", &open_acl()).unwrap();

    let mut txn = FencedTransaction::begin(&session, &lock_fence()).unwrap();
    txn.stage_create("/data/b", b"b", &open_acl(), CreateMode::Persistent)
        .unwrap();
    txn.stage_set_data("/data/a", b"stale write", 9).unwrap();
    let err = txn.commit().unwrap_err();

    // Marker create is index 0, the create index 1, the bad set index 2.
    assert!(matches!(
        err,
        CoordError::MultiOpAborted {
            index: 2,
            op: "set_data",
            ..
        }
    ));
    assert!(!store.exists("/data/b").unwrap());
    let (data, stat) = store.get_data_with_stat("/data/a").unwrap().unwrap();
    assert_eq!(data, b"");
    assert_eq!(stat.version, 0);
    assert!(!store.exists("/lock").unwrap());
}

// =============================================================================
// Terminal States
// =============================================================================

/// A failed commit consumes the staged batch: the transaction is terminal
/// and recovery is a fresh `begin`, never a recommit.
#[test]
fn test_failed_transaction_stays_terminal() {
    let ensemble = MemoryEnsemble::new();
    let session = session_on(&ensemble);
    let store = PathStore::new(session.clone());
    store.create("/lock", &open_acl()).unwrap();

    let mut txn = FencedTransaction::begin(&session, &lock_fence()).unwrap();
    assert!(txn.commit().is_err());
    assert_eq!(txn.state(), TxnState::Failed);

    assert_eq!(txn.commit().unwrap_err(), CoordError::TransactionClosed);
    assert_eq!(
        txn.stage_delete("/anything").unwrap_err(),
        CoordError::TransactionClosed
    );

    // After clearing the conflict, a fresh transaction goes through.
    store.delete("/lock").unwrap();
    let mut retry = FencedTransaction::begin(&session, &lock_fence()).unwrap();
    retry.commit().unwrap();
    assert_eq!(retry.state(), TxnState::Committed);
}

/// Committed is just as terminal as failed.
#[test]
fn test_committed_transaction_rejects_further_use() {
    let ensemble = MemoryEnsemble::new();
    let session = session_on(&ensemble);

    let mut txn = FencedTransaction::begin(&session, &lock_fence()).unwrap();
    txn.commit().unwrap();
    assert_eq!(txn.state(), TxnState::Committed);
    assert_eq!(txn.commit().unwrap_err(), CoordError::TransactionClosed);
    assert_eq!(
        txn.stage_create("/x", b"", &open_acl(), CreateMode::Persistent)
            .unwrap_err(),
        CoordError::TransactionClosed
    );
}

// =============================================================================
// Overlapping Submission Windows
// =============================================================================

/// A connection whose batch application pauses after the marker create,
/// simulating a server-side application window wide enough for another
/// writer's batch to arrive mid-flight.
struct WindowedConnection {
    inner: Arc<dyn Connection>,
    marker_applied: Arc<Barrier>,
    release: Arc<Barrier>,
}

impl Connection for WindowedConnection {
    fn create(&self, path: &str, data: &[u8], acl: &[Acl], mode: CreateMode) -> ServiceResult<()> {
        self.inner.create(path, data, acl, mode)
    }

    fn delete(&self, path: &str) -> ServiceResult<()> {
        self.inner.delete(path)
    }

    fn set_data(&self, path: &str, data: &[u8], version: i32) -> ServiceResult<NodeStat> {
        self.inner.set_data(path, data, version)
    }

    fn get_data(&self, path: &str) -> ServiceResult<(Vec<u8>, NodeStat)> {
        self.inner.get_data(path)
    }

    fn get_children(&self, path: &str) -> ServiceResult<Vec<String>> {
        self.inner.get_children(path)
    }

    fn exists(&self, path: &str) -> ServiceResult<Option<NodeStat>> {
        self.inner.exists(path)
    }

    fn get_acl(&self, path: &str) -> ServiceResult<Vec<Acl>> {
        self.inner.get_acl(path)
    }

    fn multi(&self, mut ops: Vec<Op>) -> Result<(), MultiOpFailure> {
        let marker_create = ops.remove(0);
        self.inner.multi(vec![marker_create])?;
        self.marker_applied.wait();
        self.release.wait();
        self.inner.multi(ops).map_err(|failure| MultiOpFailure {
            index: failure.index + 1,
            op: failure.op,
            source: failure.source,
        })
    }

    fn close(&self) {
        self.inner.close();
    }
}

struct WindowedConnector {
    ensemble: MemoryEnsemble,
    marker_applied: Arc<Barrier>,
    release: Arc<Barrier>,
}

impl Connector for WindowedConnector {
    fn connect(
        &self,
        address: &str,
        session_timeout: Duration,
        auths: &[AuthCredential],
        sasl: Option<&SaslContext>,
    ) -> ServiceResult<Arc<dyn Connection>> {
        let inner = self
            .ensemble
            .connect(address, session_timeout, auths, sasl)?;
        Ok(Arc::new(WindowedConnection {
            inner,
            marker_applied: Arc::clone(&self.marker_applied),
            release: Arc::clone(&self.release),
        }))
    }
}

/// Two coordinators share the marker path and their submission windows
/// truly overlap: exactly one commit succeeds, the loser observes an
/// aborted batch, and the marker is gone once both calls return.
#[test]
fn test_exactly_one_winner_under_overlap() {
    let ensemble = MemoryEnsemble::new();
    let setup = PathStore::new(session_on(&ensemble));
    setup.create("/data", &open_acl()).unwrap();

    let marker_applied = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));

    let windowed = SessionManager::with_connector(
        CoordConfig::with_address("ensemble:2181"),
        WindowedConnector {
            ensemble: ensemble.clone(),
            marker_applied: Arc::clone(&marker_applied),
            release: Arc::clone(&release),
        },
    );
    let slow_session = windowed.start().unwrap();

    let slow = std::thread::spawn(move || {
        let mut txn = FencedTransaction::begin(&slow_session, &lock_fence()).unwrap();
        txn.stage_create("/data/x", b"v1", &open_acl(), CreateMode::Persistent)
            .unwrap();
        txn.commit()
    });

    // The slow writer has created the marker and is mid-application.
    marker_applied.wait();

    let fast_session = session_on(&ensemble);
    let mut contender = FencedTransaction::begin(&fast_session, &lock_fence()).unwrap();
    contender
        .stage_create("/data/y", b"v2", &open_acl(), CreateMode::Persistent)
        .unwrap();
    let err = contender.commit().unwrap_err();
    assert_eq!(
        err,
        CoordError::MultiOpAborted {
            index: 0,
            op: "create",
            source: ServiceError::NodeExists {
                path: "/lock".to_string()
            },
        }
    );

    release.wait();
    slow.join().expect("slow writer panicked").unwrap();

    let probe = PathStore::new(session_on(&ensemble));
    assert_eq!(probe.get_string("/data/x").unwrap().unwrap(), "v1");
    assert!(!probe.exists("/data/y").unwrap());
    assert!(!probe.exists("/lock").unwrap());
}
