//! # In-Memory Ensemble
//!
//! A deterministic, single-process implementation of the coordination
//! service. Every operation, including multi-operation batches, serializes
//! behind one mutex; a batch is validated in order against a scratch copy of
//! the tree and installed only if every operation validates, so partial
//! application is impossible and no intermediate state is ever observable.
//!
//! Nodes live in a `BTreeMap` keyed by absolute path, which makes child
//! listings and descendant scans deterministic. Connection-level fault
//! injection (`fail_next_connects`, `reject_auth_scheme`) exercises the
//! session manager's retry and auth paths.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::acl::Acl;

use super::errors::{MultiOpFailure, ServiceError, ServiceResult};
use super::{AuthCredential, Connection, Connector, CreateMode, NodeStat, Op, SaslContext};

/// One node's stored state.
#[derive(Debug, Clone)]
struct NodeRecord {
    data: Vec<u8>,
    version: i32,
    acl: Vec<Acl>,
    /// Owning session id for ephemeral nodes.
    owner: Option<u64>,
}

impl NodeRecord {
    fn new(data: Vec<u8>, acl: Vec<Acl>, owner: Option<u64>) -> Self {
        Self {
            data,
            version: 0,
            acl,
            owner,
        }
    }
}

/// The hierarchical namespace, rooted at `/`.
#[derive(Debug)]
struct Tree {
    nodes: BTreeMap<String, NodeRecord>,
}

impl Tree {
    fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            "/".to_string(),
            NodeRecord::new(Vec::new(), vec![Acl::world_anyone()], None),
        );
        Self { nodes }
    }

    fn check_path(path: &str) -> ServiceResult<()> {
        if path.is_empty() || !path.starts_with('/') {
            return Err(ServiceError::BadPath {
                path: path.to_string(),
            });
        }
        Ok(())
    }

    /// Parent path, or `None` for the root itself.
    fn parent_of(path: &str) -> Option<&str> {
        if path == "/" {
            return None;
        }
        match path.rfind('/') {
            Some(0) => Some("/"),
            Some(idx) => Some(&path[..idx]),
            None => None,
        }
    }

    /// Prefix every descendant key of `path` starts with.
    fn descendant_prefix(path: &str) -> String {
        if path == "/" {
            "/".to_string()
        } else {
            format!("{}/", path)
        }
    }

    fn num_children(&self, path: &str) -> usize {
        self.child_names(path).len()
    }

    fn child_names(&self, path: &str) -> Vec<String> {
        let prefix = Self::descendant_prefix(path);
        self.nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter(|(key, _)| !key[prefix.len()..].contains('/'))
            .map(|(key, _)| key[prefix.len()..].to_string())
            .collect()
    }

    fn stat_of(&self, path: &str) -> Option<NodeStat> {
        self.nodes.get(path).map(|record| NodeStat {
            version: record.version,
            data_length: record.data.len(),
            num_children: self.num_children(path),
        })
    }

    fn create(
        &mut self,
        path: &str,
        data: &[u8],
        acl: &[Acl],
        mode: CreateMode,
        session: u64,
    ) -> ServiceResult<()> {
        Self::check_path(path)?;
        if self.nodes.contains_key(path) {
            return Err(ServiceError::NodeExists {
                path: path.to_string(),
            });
        }
        let parent = Self::parent_of(path).ok_or_else(|| ServiceError::BadPath {
            path: path.to_string(),
        })?;
        if !self.nodes.contains_key(parent) {
            return Err(ServiceError::NoNode {
                path: parent.to_string(),
            });
        }
        let owner = match mode {
            CreateMode::Persistent => None,
            CreateMode::Ephemeral => Some(session),
        };
        self.nodes
            .insert(path.to_string(), NodeRecord::new(data.to_vec(), acl.to_vec(), owner));
        Ok(())
    }

    fn delete(&mut self, path: &str) -> ServiceResult<()> {
        Self::check_path(path)?;
        if path == "/" {
            return Err(ServiceError::BadPath {
                path: path.to_string(),
            });
        }
        if !self.nodes.contains_key(path) {
            return Err(ServiceError::NoNode {
                path: path.to_string(),
            });
        }
        if self.num_children(path) > 0 {
            return Err(ServiceError::NotEmpty {
                path: path.to_string(),
            });
        }
        self.nodes.remove(path);
        Ok(())
    }

    fn set_data(&mut self, path: &str, data: &[u8], version: i32) -> ServiceResult<NodeStat> {
        Self::check_path(path)?;
        let record = self.nodes.get_mut(path).ok_or_else(|| ServiceError::NoNode {
            path: path.to_string(),
        })?;
        if version != -1 && version != record.version {
            return Err(ServiceError::BadVersion {
                path: path.to_string(),
                expected: version,
                actual: record.version,
            });
        }
        record.data = data.to_vec();
        record.version += 1;
        let version = record.version;
        let data_length = record.data.len();
        Ok(NodeStat {
            version,
            data_length,
            num_children: self.num_children(path),
        })
    }

    fn apply(&mut self, op: &Op, session: u64) -> ServiceResult<()> {
        match op {
            Op::Create {
                path,
                data,
                acl,
                mode,
            } => self.create(path, data, acl, *mode, session),
            Op::Delete { path } => self.delete(path),
            Op::SetData {
                path,
                data,
                version,
            } => self.set_data(path, data, *version).map(|_| ()),
        }
    }

    /// Remove every ephemeral node owned by `session`, descendants included.
    fn purge_session(&mut self, session: u64) {
        let roots: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, record)| record.owner == Some(session))
            .map(|(key, _)| key.clone())
            .collect();
        for root in roots {
            let prefix = Self::descendant_prefix(&root);
            let doomed: Vec<String> = self
                .nodes
                .range(prefix.clone()..)
                .take_while(|(key, _)| key.starts_with(&prefix))
                .map(|(key, _)| key.clone())
                .collect();
            for key in doomed {
                self.nodes.remove(&key);
            }
            self.nodes.remove(&root);
        }
    }
}

/// Shared state behind every connection to the same ensemble.
struct Shared {
    tree: Mutex<Tree>,
    next_session: AtomicU64,
    connect_attempts: AtomicU64,
    refuse_connects: AtomicU32,
    rejected_schemes: Mutex<Vec<String>>,
    last_auths: Mutex<Vec<AuthCredential>>,
    last_sasl: Mutex<Option<SaslContext>>,
}

/// A deterministic in-memory ensemble.
///
/// Cloning yields another handle to the same namespace, so one ensemble can
/// serve many sessions, exactly like a shared deployment.
#[derive(Clone)]
pub struct MemoryEnsemble {
    shared: Arc<Shared>,
}

impl MemoryEnsemble {
    /// Create an empty ensemble containing only the root node.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                tree: Mutex::new(Tree::new()),
                next_session: AtomicU64::new(1),
                connect_attempts: AtomicU64::new(0),
                refuse_connects: AtomicU32::new(0),
                rejected_schemes: Mutex::new(Vec::new()),
                last_auths: Mutex::new(Vec::new()),
                last_sasl: Mutex::new(None),
            }),
        }
    }

    /// Refuse the next `n` connection attempts with a transient
    /// connection-loss failure.
    pub fn fail_next_connects(&self, n: u32) {
        self.shared.refuse_connects.store(n, Ordering::SeqCst);
    }

    /// Reject any future connect that presents a credential for `scheme`.
    pub fn reject_auth_scheme(&self, scheme: impl Into<String>) {
        self.shared
            .rejected_schemes
            .lock()
            .expect("ensemble lock poisoned")
            .push(scheme.into());
    }

    /// Total connection attempts observed, refused ones included.
    pub fn connect_attempts(&self) -> u64 {
        self.shared.connect_attempts.load(Ordering::SeqCst)
    }

    /// The auth pairs presented by the most recent successful connect.
    pub fn last_auths(&self) -> Vec<AuthCredential> {
        self.shared
            .last_auths
            .lock()
            .expect("ensemble lock poisoned")
            .clone()
    }

    /// The SASL context presented by the most recent successful connect.
    pub fn last_sasl(&self) -> Option<SaslContext> {
        self.shared
            .last_sasl
            .lock()
            .expect("ensemble lock poisoned")
            .clone()
    }

    fn tree(&self) -> std::sync::MutexGuard<'_, Tree> {
        self.shared.tree.lock().expect("ensemble lock poisoned")
    }
}

impl Default for MemoryEnsemble {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for MemoryEnsemble {
    fn connect(
        &self,
        _address: &str,
        _session_timeout: Duration,
        auths: &[AuthCredential],
        sasl: Option<&SaslContext>,
    ) -> ServiceResult<Arc<dyn Connection>> {
        self.shared.connect_attempts.fetch_add(1, Ordering::SeqCst);

        let remaining = self.shared.refuse_connects.load(Ordering::SeqCst);
        if remaining > 0 {
            self.shared
                .refuse_connects
                .store(remaining - 1, Ordering::SeqCst);
            return Err(ServiceError::ConnectionLoss);
        }

        {
            let rejected = self
                .shared
                .rejected_schemes
                .lock()
                .expect("ensemble lock poisoned");
            for auth in auths {
                if rejected.contains(&auth.scheme) {
                    return Err(ServiceError::AuthFailed {
                        scheme: auth.scheme.clone(),
                    });
                }
            }
        }

        *self
            .shared
            .last_auths
            .lock()
            .expect("ensemble lock poisoned") = auths.to_vec();
        *self
            .shared
            .last_sasl
            .lock()
            .expect("ensemble lock poisoned") = sasl.cloned();

        let session = self.shared.next_session.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryConnection {
            ensemble: self.clone(),
            session,
            open: AtomicBool::new(true),
        }))
    }
}

/// One session's connection to a [`MemoryEnsemble`].
struct MemoryConnection {
    ensemble: MemoryEnsemble,
    session: u64,
    open: AtomicBool,
}

impl MemoryConnection {
    fn guard(&self) -> ServiceResult<()> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ServiceError::SessionExpired)
        }
    }
}

impl Connection for MemoryConnection {
    fn create(&self, path: &str, data: &[u8], acl: &[Acl], mode: CreateMode) -> ServiceResult<()> {
        self.guard()?;
        self.ensemble
            .tree()
            .create(path, data, acl, mode, self.session)
    }

    fn delete(&self, path: &str) -> ServiceResult<()> {
        self.guard()?;
        self.ensemble.tree().delete(path)
    }

    fn set_data(&self, path: &str, data: &[u8], version: i32) -> ServiceResult<NodeStat> {
        self.guard()?;
        self.ensemble.tree().set_data(path, data, version)
    }

    fn get_data(&self, path: &str) -> ServiceResult<(Vec<u8>, NodeStat)> {
        self.guard()?;
        let tree = self.ensemble.tree();
        Tree::check_path(path)?;
        match (tree.nodes.get(path), tree.stat_of(path)) {
            (Some(record), Some(stat)) => Ok((record.data.clone(), stat)),
            _ => Err(ServiceError::NoNode {
                path: path.to_string(),
            }),
        }
    }

    fn get_children(&self, path: &str) -> ServiceResult<Vec<String>> {
        self.guard()?;
        let tree = self.ensemble.tree();
        Tree::check_path(path)?;
        if !tree.nodes.contains_key(path) {
            return Err(ServiceError::NoNode {
                path: path.to_string(),
            });
        }
        Ok(tree.child_names(path))
    }

    fn exists(&self, path: &str) -> ServiceResult<Option<NodeStat>> {
        self.guard()?;
        let tree = self.ensemble.tree();
        Tree::check_path(path)?;
        Ok(tree.stat_of(path))
    }

    fn get_acl(&self, path: &str) -> ServiceResult<Vec<Acl>> {
        self.guard()?;
        let tree = self.ensemble.tree();
        Tree::check_path(path)?;
        tree.nodes
            .get(path)
            .map(|record| record.acl.clone())
            .ok_or_else(|| ServiceError::NoNode {
                path: path.to_string(),
            })
    }

    fn multi(&self, ops: Vec<Op>) -> Result<(), MultiOpFailure> {
        if let Err(source) = self.guard() {
            return Err(MultiOpFailure {
                index: 0,
                op: ops.first().map(Op::name).unwrap_or("multi"),
                source,
            });
        }
        let mut tree = self.ensemble.tree();
        // Validate and apply against a scratch copy; install only if every
        // operation succeeds.
        let mut staging = Tree {
            nodes: tree.nodes.clone(),
        };
        for (index, op) in ops.iter().enumerate() {
            if let Err(source) = staging.apply(op, self.session) {
                return Err(MultiOpFailure {
                    index,
                    op: op.name(),
                    source,
                });
            }
        }
        tree.nodes = staging.nodes;
        Ok(())
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            self.ensemble.tree().purge_session(self.session);
        }
    }
}
