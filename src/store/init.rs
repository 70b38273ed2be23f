//! # Recursive Path Initialization
//!
//! Idempotent creation of a node and all of its ancestors, used to lay
//! down a base path before anything else touches it. Each ancestor create
//! is independently idempotent, so repeated or concurrent invocations over
//! the same path are safe and converge on the same tree.

use crate::acl::Acl;
use crate::errors::CoordResult;

use super::paths;
use super::PathStore;

/// Creates ancestor paths in root-to-leaf order.
pub struct PathInitializer<'a> {
    store: &'a PathStore,
}

impl<'a> PathInitializer<'a> {
    /// Initializer over `store`.
    pub fn new(store: &'a PathStore) -> Self {
        Self { store }
    }

    /// Ensure `path` and every ancestor exists, creating the missing ones
    /// with `acl`. Rejects relative paths; nodes that already exist are
    /// left untouched, whatever their data or grants.
    pub fn ensure(&self, path: &str, acl: &[Acl]) -> CoordResult<()> {
        for prefix in paths::ancestors(path)? {
            self.store.create(&prefix, acl)?;
        }
        Ok(())
    }
}
