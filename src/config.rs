//! # Configuration Surface
//!
//! Typed configuration for a coordination session. The structs derive
//! `serde` so an embedding process can carry them inside its own
//! configuration tree; reading and parsing configuration files stays
//! outside this crate. Values are immutable after the session manager is
//! constructed.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::acl::Acl;
use crate::service::AuthCredential;

/// Default number of connection retries.
pub const DEFAULT_NUM_RETRIES: u32 = 1000;
/// Default session timeout in milliseconds.
pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 10_000;
/// Default wait between connection retries in milliseconds.
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 1000;

/// Fixed-count, fixed-interval retry policy for connection attempts.
///
/// Transient failures are retried up to `max_retries` times beyond the
/// first attempt, sleeping `interval_ms` between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Wait between attempts, in milliseconds.
    pub interval_ms: u64,
}

impl RetryPolicy {
    /// Create a policy.
    pub fn new(max_retries: u32, interval_ms: u64) -> Self {
        Self {
            max_retries,
            interval_ms,
        }
    }

    /// The wait between attempts.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_NUM_RETRIES,
            interval_ms: DEFAULT_RETRY_INTERVAL_MS,
        }
    }
}

/// Secure-login configuration.
///
/// All fields optional: secure login is only attempted when both the client
/// principal and the keytab are present. The session manager resolves this
/// into an explicit [`crate::service::SaslContext`]; nothing global is
/// touched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaslConfig {
    /// Principal the service itself authenticates as, if pinned.
    pub service_principal: Option<String>,
    /// Client principal to log in with.
    pub client_principal: Option<String>,
    /// Path to the client keytab.
    pub keytab: Option<String>,
}

/// Connection configuration for a coordination ensemble.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordConfig {
    /// Ensemble address, e.g. `"host1:2181,host2:2181"`. Required; the
    /// session manager refuses to start without it.
    pub address: String,
    /// Session timeout in milliseconds.
    pub session_timeout_ms: u64,
    /// Connection retry policy.
    pub retry: RetryPolicy,
    /// Grants applied where callers do not name their own.
    pub acls: Vec<Acl>,
    /// Auth pairs presented at connect, before any passed explicitly to
    /// `start`.
    pub auths: Vec<AuthCredential>,
    /// Secure-login wiring.
    pub sasl: Option<SaslConfig>,
}

impl CoordConfig {
    /// Configuration for `address` with every other field at its default.
    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    /// The session timeout.
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }
}

impl Default for CoordConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            session_timeout_ms: DEFAULT_SESSION_TIMEOUT_MS,
            retry: RetryPolicy::default(),
            acls: vec![Acl::world_anyone()],
            auths: Vec::new(),
            sasl: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoordConfig::default();
        assert!(config.address.is_empty());
        assert_eq!(config.session_timeout_ms, 10_000);
        assert_eq!(config.retry.max_retries, 1000);
        assert_eq!(config.retry.interval_ms, 1000);
        assert_eq!(config.acls, vec![Acl::world_anyone()]);
        assert!(config.auths.is_empty());
        assert!(config.sasl.is_none());
    }

    #[test]
    fn test_with_address() {
        let config = CoordConfig::with_address("zk1:2181");
        assert_eq!(config.address, "zk1:2181");
        assert_eq!(config.session_timeout(), Duration::from_millis(10_000));
    }

    #[test]
    fn test_config_round_trips_through_serde() {
        let mut config = CoordConfig::with_address("zk1:2181,zk2:2181");
        config.retry = RetryPolicy::new(3, 250);
        config.sasl = Some(SaslConfig {
            service_principal: Some("service/host".to_string()),
            client_principal: Some("client@REALM".to_string()),
            keytab: Some("/etc/client.keytab".to_string()),
        });

        let json = serde_json::to_string(&config).unwrap();
        let back: CoordConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
