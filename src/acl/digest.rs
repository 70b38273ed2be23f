//! # Digest Credentials
//!
//! Helpers for the `digest` authentication scheme. A digest identity is
//! stored on a node as `user:BASE64(SHA-256("user:password"))`, while the
//! session presents the plaintext `user:password` pair at connect time and
//! the service performs the hashing on its side.
//!
//! Comparison against a stored identity is constant-time.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::service::AuthCredential;

/// Compute the stored identity form for a user/password pair.
pub fn generate_digest(user: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    format!("{}:{}", user, STANDARD.encode(hasher.finalize()))
}

/// Build the auth pair a session presents for the `digest` scheme.
pub fn credential(user: &str, password: &str) -> AuthCredential {
    AuthCredential::new("digest", format!("{}:{}", user, password).into_bytes())
}

/// Check a plaintext pair against a stored digest identity.
///
/// Constant-time over the digest comparison, so a mismatch reveals nothing
/// about how much of the identity matched.
pub fn verify(user: &str, password: &str, stored: &str) -> bool {
    let computed = generate_digest(user, password);
    computed.as_bytes().ct_eq(stored.as_bytes()).into()
}
