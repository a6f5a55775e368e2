//! Shared, reference-counted login state.
//!
//! Every channel built by a configured builder authenticates with the same
//! [`Subject`]. A [`CredentialRegistry`] performs one login per distinct
//! [`CredentialKey`] and hands out [`LoginManager`] handles that share it.
//! The login is torn down when the last handle is released.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kafka_channel_core::auth::login_manager::CredentialRegistry;
//! use kafka_channel_core::config::{KerberosConfig, Mode};
//! use kafka_channel_core::testing::CountingLogin;
//!
//! let login = Arc::new(CountingLogin::new());
//! let registry = Arc::new(CredentialRegistry::new(login.clone()));
//! let config = KerberosConfig::default();
//!
//! let first = registry.acquire(Mode::Server, &config).unwrap();
//! let second = registry.acquire(Mode::Server, &config).unwrap();
//! assert_eq!(login.logins(), 1);
//!
//! first.release();
//! second.release();
//! assert_eq!(login.logouts(), 1);
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::SystemTime;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info};

use super::kerberos::KerberosName;
use crate::config::{KerberosConfig, Mode};
use crate::error::CredentialError;

/// Identity material produced by a login.
///
/// Accessors are plain reads and safe to call concurrently from any number
/// of authenticators.
pub struct Subject {
    mode: Mode,
    principal: String,
    service_name: Option<String>,
    keytab: Option<PathBuf>,
    login_time: SystemTime,
    logged_out: AtomicBool,
}

impl Subject {
    /// Create a logged-in subject.
    pub fn new(
        mode: Mode,
        principal: impl Into<String>,
        service_name: Option<String>,
        keytab: Option<PathBuf>,
    ) -> Self {
        Self {
            mode,
            principal: principal.into(),
            service_name,
            keytab,
            login_time: SystemTime::now(),
            logged_out: AtomicBool::new(false),
        }
    }

    /// Role this subject logged in for.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The logged-in principal.
    #[must_use]
    pub fn principal(&self) -> &str {
        &self.principal
    }

    /// Kerberos service name used to reach or serve Kafka.
    #[must_use]
    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    /// Keytab the principal's keys came from.
    #[must_use]
    pub fn keytab(&self) -> Option<&Path> {
        self.keytab.as_deref()
    }

    /// Realm of the principal, if it has one.
    #[must_use]
    pub fn realm(&self) -> Option<String> {
        KerberosName::parse(&self.principal)
            .ok()
            .and_then(|name| name.realm().map(str::to_string))
    }

    /// When the login happened.
    #[must_use]
    pub fn login_time(&self) -> SystemTime {
        self.login_time
    }

    /// Whether the last handle to this login has been released.
    #[must_use]
    pub fn is_logged_out(&self) -> bool {
        self.logged_out.load(Ordering::Acquire)
    }

    fn mark_logged_out(&self) {
        self.logged_out.store(true, Ordering::Release);
    }
}

impl fmt::Debug for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subject")
            .field("mode", &self.mode)
            .field("principal", &self.principal)
            .field("service_name", &self.service_name)
            .field("logged_out", &self.is_logged_out())
            .finish_non_exhaustive()
    }
}

/// Identity of a login: role plus the configuration that drives it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CredentialKey {
    /// Role of the login.
    pub mode: Mode,
    /// Principal after environment expansion.
    pub principal: Option<String>,
    /// Keytab after environment expansion.
    pub keytab: Option<PathBuf>,
    /// Configured service name.
    pub service_name: Option<String>,
}

impl CredentialKey {
    /// Derive the key for a role from Kerberos configuration.
    #[must_use]
    pub fn from_config(mode: Mode, config: &KerberosConfig) -> Self {
        Self {
            mode,
            principal: config.principal(),
            keytab: config.keytab(),
            service_name: config.service_name().map(str::to_string),
        }
    }
}

/// Performs and tears down logins.
///
/// `login` runs while the registry holds the lock for the key, so it must not
/// call back into the registry.
pub trait Login: Send + Sync + fmt::Debug {
    /// Obtain identity material for a key.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::Unavailable` if the key lacks identity
    /// material for its role.
    fn login(&self, key: &CredentialKey) -> Result<Subject, CredentialError>;

    /// Tear down a subject once its last handle is released.
    fn logout(&self, _subject: &Subject) {}
}

/// Keytab-based Kerberos login.
///
/// Requires a principal for both roles, and a service name for clients.
/// Servers without a configured service name use the first component of
/// their principal.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeytabLogin;

impl Login for KeytabLogin {
    fn login(&self, key: &CredentialKey) -> Result<Subject, CredentialError> {
        let unavailable = |reason: String| CredentialError::Unavailable {
            mode: key.mode,
            reason,
        };

        let principal = key
            .principal
            .clone()
            .ok_or_else(|| unavailable("no Kerberos principal configured".to_string()))?;
        let name = KerberosName::parse(&principal)
            .map_err(|e| unavailable(format!("invalid principal: {e}")))?;

        if let Some(keytab) = &key.keytab {
            if !keytab.is_file() {
                return Err(unavailable(format!(
                    "keytab '{}' does not exist",
                    keytab.display()
                )));
            }
        }

        let service_name = match (&key.service_name, key.mode) {
            (Some(service), _) => service.clone(),
            (None, Mode::Server) => name.service_name().to_string(),
            (None, Mode::Client) => {
                return Err(unavailable(
                    "no service name defined in Kafka config".to_string(),
                ))
            }
        };

        Ok(Subject::new(
            key.mode,
            principal,
            Some(service_name),
            key.keytab.clone(),
        ))
    }

    fn logout(&self, subject: &Subject) {
        debug!(principal = %subject.principal(), "destroying Kerberos login");
    }
}

struct RegistryEntry {
    subject: Arc<Subject>,
    refs: AtomicUsize,
}

/// Registry of live logins keyed by [`CredentialKey`].
pub struct CredentialRegistry {
    login: Arc<dyn Login>,
    entries: DashMap<CredentialKey, RegistryEntry>,
}

impl CredentialRegistry {
    /// Create a registry that logs in through `login`.
    pub fn new(login: Arc<dyn Login>) -> Self {
        Self {
            login,
            entries: DashMap::new(),
        }
    }

    /// The process-wide registry, backed by [`KeytabLogin`].
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<CredentialRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::new(Arc::new(KeytabLogin)))))
    }

    /// Acquire the login for a role and configuration.
    ///
    /// The first acquirer of a key performs the login; later acquirers share
    /// it and bump its reference count.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::Unavailable` if the login fails. A failed
    /// login leaves no entry behind.
    pub fn acquire(
        self: &Arc<Self>,
        mode: Mode,
        config: &KerberosConfig,
    ) -> Result<LoginManager, CredentialError> {
        let key = CredentialKey::from_config(mode, config);

        let subject = match self.entries.entry(key.clone()) {
            Entry::Occupied(entry) => {
                let refs = entry.get().refs.fetch_add(1, Ordering::AcqRel) + 1;
                debug!(?mode, refs, "reusing existing login");
                Arc::clone(&entry.get().subject)
            }
            Entry::Vacant(entry) => {
                let subject = Arc::new(self.login.login(&key)?);
                info!(?mode, principal = %subject.principal(), "successfully logged in");
                entry.insert(RegistryEntry {
                    subject: Arc::clone(&subject),
                    refs: AtomicUsize::new(1),
                });
                subject
            }
        };

        Ok(LoginManager {
            registry: Arc::clone(self),
            key,
            subject,
            released: AtomicBool::new(false),
        })
    }

    fn release(&self, key: &CredentialKey) {
        let removed = self
            .entries
            .remove_if(key, |_, entry| entry.refs.fetch_sub(1, Ordering::AcqRel) == 1);

        if let Some((_, entry)) = removed {
            entry.subject.mark_logged_out();
            self.login.logout(&entry.subject);
            info!(mode = ?key.mode, principal = %entry.subject.principal(), "logged out");
        }
    }

    /// Current number of live handles for a key.
    #[must_use]
    pub fn refcount(&self, key: &CredentialKey) -> usize {
        self.entries
            .get(key)
            .map_or(0, |entry| entry.refs.load(Ordering::Acquire))
    }

    /// Number of distinct live logins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no login is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for CredentialRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRegistry")
            .field("login", &self.login)
            .field("live_logins", &self.entries.len())
            .finish()
    }
}

/// A handle on a shared login.
///
/// Each handle holds one reference. [`release`](Self::release) drops it at
/// most once; dropping an unreleased handle releases it.
pub struct LoginManager {
    registry: Arc<CredentialRegistry>,
    key: CredentialKey,
    subject: Arc<Subject>,
    released: AtomicBool,
}

impl LoginManager {
    /// The shared subject.
    #[must_use]
    pub fn subject(&self) -> Arc<Subject> {
        Arc::clone(&self.subject)
    }

    /// Kerberos service name of the login.
    #[must_use]
    pub fn service_name(&self) -> Option<&str> {
        self.subject.service_name()
    }

    /// Key this handle was acquired under.
    #[must_use]
    pub fn key(&self) -> &CredentialKey {
        &self.key
    }

    /// Whether this handle has given up its reference.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Give up this handle's reference. Repeated calls are no-ops.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            debug!(mode = ?self.key.mode, "login handle already released");
            return;
        }
        self.registry.release(&self.key);
    }
}

impl Drop for LoginManager {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for LoginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginManager")
            .field("key", &self.key)
            .field("subject", &self.subject)
            .field("released", &self.is_released())
            .finish()
    }
}
