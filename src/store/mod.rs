//! # Path Store
//!
//! Pass-through CRUD on hierarchical nodes over an open session. Expected
//! local conditions are boolean results, not errors: creating an existing
//! path returns `false`, deleting an absent one returns `false`. Everything
//! here is synchronous and carries no client-side locking; ordering and
//! atomicity come from the coordination service.

mod init;
pub mod paths;

pub use init::PathInitializer;
pub use paths::node_path;

use crate::acl::Acl;
use crate::errors::CoordResult;
use crate::service::{CreateMode, NodeStat, ServiceError};
use crate::session::Session;
use crate::txn::{Fence, FencedTransaction};

/// CRUD operations over one session.
///
/// Cheap to construct; holds a clone of the session handle, so many stores
/// over one session are fine.
pub struct PathStore {
    session: Session,
}

impl PathStore {
    /// Store over `session`.
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// The session this store operates through.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Whether a node exists at `path`.
    pub fn exists(&self, path: &str) -> CoordResult<bool> {
        paths::validate(path)?;
        Ok(self.session.connection()?.exists(path)?.is_some())
    }

    /// A node's payload, or `None` if the path is absent.
    pub fn get_data(&self, path: &str) -> CoordResult<Option<Vec<u8>>> {
        Ok(self.get_data_with_stat(path)?.map(|(data, _)| data))
    }

    /// A node's payload and metadata, or `None` if the path is absent.
    pub fn get_data_with_stat(&self, path: &str) -> CoordResult<Option<(Vec<u8>, NodeStat)>> {
        paths::validate(path)?;
        match self.session.connection()?.get_data(path) {
            Ok(found) => Ok(Some(found)),
            Err(ServiceError::NoNode { .. }) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// A node's payload decoded as UTF-8 (lossily), or `None` if absent.
    pub fn get_string(&self, path: &str) -> CoordResult<Option<String>> {
        Ok(self
            .get_data(path)?
            .map(|data| String::from_utf8_lossy(&data).into_owned()))
    }

    /// Replace a node's payload if `expected_version` matches the stored
    /// version (`-1` matches any). On success the version increments by
    /// exactly one; on mismatch the node is unchanged and
    /// [`crate::errors::CoordError::VersionConflict`] is returned.
    pub fn set_data(&self, path: &str, data: &[u8], expected_version: i32) -> CoordResult<NodeStat> {
        paths::validate(path)?;
        Ok(self
            .session
            .connection()?
            .set_data(path, data, expected_version)?)
    }

    /// UTF-8 convenience over [`PathStore::set_data`].
    pub fn set_string(&self, path: &str, data: &str, expected_version: i32) -> CoordResult<NodeStat> {
        self.set_data(path, data.as_bytes(), expected_version)
    }

    /// Names of a node's direct children. Unique; no defined ordering.
    pub fn get_children(&self, path: &str) -> CoordResult<Vec<String>> {
        paths::validate(path)?;
        Ok(self.session.connection()?.get_children(path)?)
    }

    /// Create an empty persistent node. Returns `false` without touching
    /// the service state if the path already exists.
    pub fn create(&self, path: &str, acl: &[Acl]) -> CoordResult<bool> {
        self.create_with(path, &[], acl, CreateMode::Persistent)
    }

    /// Create a node with payload and mode. Returns `false` if the path
    /// already exists, including when another writer wins the race between
    /// the existence probe and the create.
    pub fn create_with(
        &self,
        path: &str,
        data: &[u8],
        acl: &[Acl],
        mode: CreateMode,
    ) -> CoordResult<bool> {
        paths::validate(path)?;
        let connection = self.session.connection()?;
        if connection.exists(path)?.is_some() {
            return Ok(false);
        }
        match connection.create(path, data, acl, mode) {
            Ok(()) => Ok(true),
            Err(ServiceError::NodeExists { .. }) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Delete a node and all of its descendants, leaves first. Returns
    /// `false` if the path did not exist.
    pub fn delete(&self, path: &str) -> CoordResult<bool> {
        paths::validate(path)?;
        if self.session.connection()?.exists(path)?.is_none() {
            return Ok(false);
        }
        self.delete_subtree(path)?;
        Ok(true)
    }

    fn delete_subtree(&self, path: &str) -> CoordResult<()> {
        let connection = self.session.connection()?;
        let children = match connection.get_children(path) {
            Ok(children) => children,
            // Deleted underneath us; nothing left to do.
            Err(ServiceError::NoNode { .. }) => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        for child in children {
            self.delete_subtree(&paths::node_path(path, &child))?;
        }
        match connection.delete(path) {
            Ok(()) | Err(ServiceError::NoNode { .. }) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// A node's grant list.
    pub fn get_acl(&self, path: &str) -> CoordResult<Vec<Acl>> {
        paths::validate(path)?;
        Ok(self.session.connection()?.get_acl(path)?)
    }

    /// Fenced single-node create: no-op returning `false` if the path
    /// already exists, otherwise a one-operation fenced transaction.
    pub fn safe_create(
        &self,
        path: &str,
        data: &[u8],
        acl: &[Acl],
        mode: CreateMode,
        fence: &Fence,
    ) -> CoordResult<bool> {
        if self.exists(path)? {
            return Ok(false);
        }
        let mut txn = FencedTransaction::begin(&self.session, fence)?;
        txn.stage_create(path, data, acl, mode)?;
        txn.commit()?;
        Ok(true)
    }

    /// Fenced single-node delete: no-op returning `false` if the path is
    /// absent. The target must be childless; a populated node aborts the
    /// batch.
    pub fn safe_delete(&self, path: &str, fence: &Fence) -> CoordResult<bool> {
        if !self.exists(path)? {
            return Ok(false);
        }
        let mut txn = FencedTransaction::begin(&self.session, fence)?;
        txn.stage_delete(path)?;
        txn.commit()?;
        Ok(true)
    }

    /// Fenced version-guarded payload replacement.
    pub fn safe_set_data(
        &self,
        path: &str,
        data: &[u8],
        expected_version: i32,
        fence: &Fence,
    ) -> CoordResult<()> {
        let mut txn = FencedTransaction::begin(&self.session, fence)?;
        txn.stage_set_data(path, data, expected_version)?;
        txn.commit()
    }
}
