//! # Session Management
//!
//! Owns the connection to the coordination service: address validation,
//! the connection retry loop, credential wiring, and the open/closed
//! lifecycle. A [`Session`] is a cheap cloneable handle; one session may be
//! shared by many threads, and all ordering guarantees come from the
//! service, not from client-side locking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::{CoordConfig, SaslConfig};
use crate::errors::{CoordError, CoordResult};
use crate::observability::Logger;
use crate::service::{
    AuthCredential, Connection, Connector, MemoryEnsemble, SaslContext, ServiceError,
};

/// Manages the lifecycle of sessions against one configured ensemble.
///
/// Generic over the [`Connector`] capability so deployments can supply the
/// factory for their real service client; the default connector is the
/// in-process [`MemoryEnsemble`].
pub struct SessionManager<C: Connector = MemoryEnsemble> {
    config: CoordConfig,
    connector: C,
    current: Mutex<Option<Session>>,
}

impl SessionManager<MemoryEnsemble> {
    /// Manager backed by a fresh in-memory ensemble.
    pub fn new(config: CoordConfig) -> Self {
        Self::with_connector(config, MemoryEnsemble::new())
    }
}

impl<C: Connector> SessionManager<C> {
    /// Manager backed by a caller-supplied connector.
    pub fn with_connector(config: CoordConfig, connector: C) -> Self {
        Self {
            config,
            connector,
            current: Mutex::new(None),
        }
    }

    /// The configuration this manager was built with.
    pub fn config(&self) -> &CoordConfig {
        &self.config
    }

    /// The connector capability.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Start a session with no extra auth pairs beyond the configured ones.
    pub fn start(&self) -> CoordResult<Session> {
        self.start_with(Vec::new())
    }

    /// Start a session.
    ///
    /// Auth pairs passed here are presented first, followed by the
    /// configured ones. Transient connection failures are retried per the
    /// configured policy; exhausting the budget yields
    /// [`CoordError::Connection`]. If a session from a previous `start` is
    /// still open it is closed before the new connection is attempted.
    pub fn start_with(&self, auths: Vec<AuthCredential>) -> CoordResult<Session> {
        if self.config.address.is_empty() {
            return Err(CoordError::ConfigMissing("address"));
        }

        let mut merged = auths;
        merged.extend(self.config.auths.iter().cloned());
        let sasl = resolve_sasl(self.config.sasl.as_ref());

        let mut current = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = current.take() {
            previous.close();
        }

        let connection = self.connect_with_retry(&merged, sasl.as_ref())?;
        let session = Session::new(
            self.config.address.clone(),
            self.config.session_timeout(),
            connection,
        );
        let session_id = session.id().to_string();
        Logger::info(
            "SESSION_STARTED",
            &[
                ("address", self.config.address.as_str()),
                ("session_id", session_id.as_str()),
            ],
        );
        *current = Some(session.clone());
        Ok(session)
    }

    /// Close the current session, if any. Idempotent; safe before the first
    /// `start` and after any number of `close` calls.
    pub fn close(&self) {
        let taken = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(session) = taken {
            session.close();
        }
    }

    fn connect_with_retry(
        &self,
        auths: &[AuthCredential],
        sasl: Option<&SaslContext>,
    ) -> CoordResult<Arc<dyn Connection>> {
        let policy = self.config.retry;
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.connector.connect(
                &self.config.address,
                self.config.session_timeout(),
                auths,
                sasl,
            ) {
                Ok(connection) => return Ok(connection),
                Err(err) if err.is_transient() && attempt <= policy.max_retries => {
                    let attempt_field = attempt.to_string();
                    Logger::warn(
                        "CONNECT_RETRY",
                        &[
                            ("address", self.config.address.as_str()),
                            ("attempt", attempt_field.as_str()),
                            ("code", err.code()),
                        ],
                    );
                    thread::sleep(policy.interval());
                }
                Err(ServiceError::AuthFailed { scheme }) => {
                    Logger::error(
                        "CONNECT_AUTH_FAILED",
                        &[
                            ("address", self.config.address.as_str()),
                            ("scheme", scheme.as_str()),
                        ],
                    );
                    return Err(CoordError::AuthFailure { scheme });
                }
                Err(err) => {
                    let attempts_field = attempt.to_string();
                    Logger::error(
                        "CONNECT_FAILED",
                        &[
                            ("address", self.config.address.as_str()),
                            ("attempts", attempts_field.as_str()),
                            ("code", err.code()),
                        ],
                    );
                    return Err(CoordError::Connection {
                        address: self.config.address.clone(),
                        attempts: attempt,
                        source: err,
                    });
                }
            }
        }
    }
}

/// Resolve the optional secure-login configuration into an explicit
/// context. A partial configuration (missing client principal or keytab)
/// disables secure login with a warning rather than failing the start.
fn resolve_sasl(config: Option<&SaslConfig>) -> Option<SaslContext> {
    let config = config?;
    match (&config.client_principal, &config.keytab) {
        (Some(principal), Some(keytab)) => Some(SaslContext {
            service_principal: config.service_principal.clone(),
            client_principal: principal.clone(),
            keytab: keytab.clone(),
        }),
        _ => {
            Logger::warn(
                "SASL_DISABLED",
                &[("reason", "client principal or keytab not configured")],
            );
            None
        }
    }
}

/// A handle to one open session.
///
/// Clones share the same underlying connection and open/closed state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("address", &self.inner.address)
            .field("session_timeout", &self.inner.session_timeout)
            .field("started_at", &self.inner.started_at)
            .field("open", &self.inner.open)
            .finish()
    }
}

struct SessionInner {
    id: Uuid,
    address: String,
    session_timeout: Duration,
    started_at: DateTime<Utc>,
    connection: Arc<dyn Connection>,
    open: AtomicBool,
}

impl Session {
    fn new(address: String, session_timeout: Duration, connection: Arc<dyn Connection>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id: Uuid::new_v4(),
                address,
                session_timeout,
                started_at: Utc::now(),
                connection,
                open: AtomicBool::new(true),
            }),
        }
    }

    /// Unique id of this session.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Ensemble address the session is connected to.
    pub fn address(&self) -> &str {
        &self.inner.address
    }

    /// Negotiated session timeout.
    pub fn session_timeout(&self) -> Duration {
        self.inner.session_timeout
    }

    /// When the session was started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.started_at
    }

    /// Whether the session is still open.
    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::SeqCst)
    }

    /// Close the session. Idempotent; ephemeral nodes created through it
    /// are released by the service.
    pub fn close(&self) {
        if self.inner.open.swap(false, Ordering::SeqCst) {
            self.inner.connection.close();
            let session_id = self.id().to_string();
            Logger::info("SESSION_CLOSED", &[("session_id", session_id.as_str())]);
        }
    }

    /// The live connection, or [`CoordError::SessionClosed`].
    pub(crate) fn connection(&self) -> CoordResult<&dyn Connection> {
        if self.is_open() {
            Ok(self.inner.connection.as_ref())
        } else {
            Err(CoordError::SessionClosed)
        }
    }
}
