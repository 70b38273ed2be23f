//! # Access Control Model
//!
//! Nodes carry a list of (scheme, identity, permissions) grants. The crate
//! treats grants as opaque data to store and return; enforcement belongs to
//! the coordination service. Parsing grant specifications out of text or
//! side files is owned by the embedding process.

pub mod digest;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Permission bits for a node.
///
/// The bit layout follows the coordination service's convention:
/// read, write, create, delete, admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Perms(u32);

impl Perms {
    /// Read node data and list children
    pub const READ: Perms = Perms(1);
    /// Set node data
    pub const WRITE: Perms = Perms(2);
    /// Create children
    pub const CREATE: Perms = Perms(4);
    /// Delete children
    pub const DELETE: Perms = Perms(8);
    /// Set ACLs
    pub const ADMIN: Perms = Perms(16);
    /// All of the above
    pub const ALL: Perms = Perms(31);

    /// Build from raw bits; unknown bits are discarded.
    pub fn from_bits(bits: u32) -> Perms {
        Perms(bits & Perms::ALL.0)
    }

    /// Returns the raw bit representation.
    #[inline]
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Returns true if every bit in `other` is present in `self`.
    #[inline]
    pub fn contains(self, other: Perms) -> bool {
        self.0 & other.0 == other.0
    }

    /// Combine two permission sets.
    #[inline]
    pub fn union(self, other: Perms) -> Perms {
        Perms(self.0 | other.0)
    }
}

impl fmt::Display for Perms {
    /// Renders the conventional `rwcda` letter form, one letter per bit.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (bit, letter) in [
            (Perms::READ, 'r'),
            (Perms::WRITE, 'w'),
            (Perms::CREATE, 'c'),
            (Perms::DELETE, 'd'),
            (Perms::ADMIN, 'a'),
        ] {
            if self.contains(bit) {
                write!(f, "{}", letter)?;
            }
        }
        Ok(())
    }
}

/// A single (scheme, identity, permissions) grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acl {
    /// Authentication scheme the identity belongs to (`world`, `digest`, `sasl`, ...)
    pub scheme: String,
    /// Scheme-specific identity
    pub id: String,
    /// Granted permissions
    pub perms: Perms,
}

impl Acl {
    /// Create a grant.
    pub fn new(scheme: impl Into<String>, id: impl Into<String>, perms: Perms) -> Self {
        Self {
            scheme: scheme.into(),
            id: id.into(),
            perms,
        }
    }

    /// The fully open grant: `world:anyone:rwcda`.
    pub fn world_anyone() -> Acl {
        Acl::new("world", "anyone", Perms::ALL)
    }
}

impl fmt::Display for Acl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.scheme, self.id, self.perms)
    }
}
