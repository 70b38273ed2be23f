//! cordon - a fenced, transactional client layer for hierarchical
//! coordination services
//!
//! The crate manages a session to a ZooKeeper-like, strongly-consistent
//! coordination service and provides a fenced, atomic multi-operation
//! transaction primitive for safely mutating shared state when several
//! cooperating processes might attempt conflicting updates.
//!
//! Layering, leaves first:
//! - [`service`] - the coordination-service abstraction and the deterministic
//!   in-memory ensemble
//! - [`session`] - session lifecycle, retry policy, credential wiring
//! - [`store`] - pass-through CRUD on hierarchical nodes
//! - [`txn`] - the fenced multi-operation transaction coordinator

pub mod acl;
pub mod config;
pub mod errors;
pub mod observability;
pub mod service;
pub mod session;
pub mod store;
pub mod txn;
