//! SASL channel builder.
//!
//! The builder is configured once, builds a [`KafkaChannel`] for every
//! accepted or initiated socket, and releases its shared login when closed.
//!
//! # Lifecycle
//!
//! ```text
//! Unconfigured --configure--> Configured --close--> Closed
//!       |                                             ^
//!       +--------------------close--------------------+
//! ```
//!
//! `build_channel` holds the state read lock for the whole build and `close`
//! takes the write lock, so a build never observes a released login.
//!
//! # Example
//!
//! ```rust,ignore
//! use kafka_channel_core::config::{ChannelConfig, Mode, SecurityProtocol};
//! use kafka_channel_core::network::SaslChannelBuilder;
//!
//! let config = ChannelConfig::from_file("channel.yaml")?;
//! let builder = SaslChannelBuilder::new(Mode::Server, SecurityProtocol::SaslPlaintext);
//! builder.configure(config)?;
//!
//! let (socket, _) = listener.accept()?;
//! let channel = builder.build_channel("conn-1", socket, 100 * 1024 * 1024)?;
//!
//! builder.close();
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::channel::KafkaChannel;
use super::socket::RawSocket;
use super::transport::TransportSelector;
use crate::auth::kerberos::{resolve_default_realm, KerberosShortNamer};
use crate::auth::login_manager::{CredentialRegistry, LoginManager, Subject};
use crate::auth::sasl::SaslAuthenticator;
use crate::config::{ChannelConfig, Mode, SecurityProtocol, SslConfig};
use crate::error::{ChannelError, ConfigError, Result};
use crate::tls::{SessionFactory, SslFactory};

/// Everything `configure` produces; immutable until `close`.
struct Configured {
    config: Arc<ChannelConfig>,
    login: LoginManager,
    short_namer: Option<Arc<KerberosShortNamer>>,
    selector: TransportSelector,
}

enum BuilderState {
    Unconfigured,
    Configured(Configured),
    Closed,
}

/// Builds SASL channels for one role and protocol.
pub struct SaslChannelBuilder {
    mode: Mode,
    protocol: SecurityProtocol,
    registry: Arc<CredentialRegistry>,
    session_factory: Option<Arc<dyn SessionFactory>>,
    state: RwLock<BuilderState>,
}

impl SaslChannelBuilder {
    /// Create an unconfigured builder using the process-wide credential
    /// registry.
    #[must_use]
    pub fn new(mode: Mode, protocol: SecurityProtocol) -> Self {
        Self {
            mode,
            protocol,
            registry: CredentialRegistry::global(),
            session_factory: None,
            state: RwLock::new(BuilderState::Unconfigured),
        }
    }

    /// Use `registry` instead of the process-wide one.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<CredentialRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Use `factory` for TLS sessions instead of building one from
    /// `ssl` options during `configure`.
    #[must_use]
    pub fn with_session_factory(mut self, factory: Arc<dyn SessionFactory>) -> Self {
        self.session_factory = Some(factory);
        self
    }

    /// Acquire the shared login and prepare per-connection collaborators.
    ///
    /// Nothing is retained if any step fails; a login acquired before the
    /// failure is released again.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for invalid options, rules or TLS material,
    /// `CredentialUnavailable` if the login fails, and `BuilderClosed` after
    /// `close`.
    pub fn configure(&self, config: ChannelConfig) -> Result<()> {
        let mut state = self.state.write();
        match *state {
            BuilderState::Unconfigured => {}
            BuilderState::Configured(_) => return Err(ConfigError::AlreadyConfigured.into()),
            BuilderState::Closed => return Err(ChannelError::BuilderClosed),
        }

        self.check_config(&config)?;

        let login = self.registry.acquire(self.mode, &config.sasl.kerberos)?;
        match self.prepare(&config) {
            Ok((short_namer, selector)) => {
                info!(
                    mode = ?self.mode,
                    protocol = ?self.protocol,
                    principal = %login.subject().principal(),
                    rules = short_namer.as_ref().map_or(0, |n| n.rule_count()),
                    "configured SASL channel builder"
                );
                *state = BuilderState::Configured(Configured {
                    config: Arc::new(config),
                    login,
                    short_namer,
                    selector,
                });
                Ok(())
            }
            Err(e) => {
                debug!(error = %e, "configure failed, releasing login");
                login.release();
                Err(e.into())
            }
        }
    }

    fn check_config(&self, config: &ChannelConfig) -> std::result::Result<(), ConfigError> {
        if !self.protocol.requires_sasl() {
            return Err(ConfigError::UnsupportedProtocol(self.protocol));
        }
        if config.mode != self.mode {
            return Err(ConfigError::ModeMismatch {
                configured: config.mode,
                builder: self.mode,
            });
        }
        if config.security_protocol != self.protocol {
            return Err(ConfigError::ProtocolMismatch {
                configured: config.security_protocol,
                builder: self.protocol,
            });
        }
        config.validate()
    }

    fn prepare(
        &self,
        config: &ChannelConfig,
    ) -> std::result::Result<(Option<Arc<KerberosShortNamer>>, TransportSelector), ConfigError> {
        let kerberos = &config.sasl.kerberos;
        let default_realm = resolve_default_realm(kerberos).unwrap_or_else(|| {
            warn!("cannot determine default Kerberos realm, DEFAULT rules will not match");
            String::new()
        });

        let namer = KerberosShortNamer::from_unparsed_rules(
            &default_realm,
            kerberos.principal_to_local_rules.as_deref(),
        )?;
        let short_namer = (!namer.is_identity()).then(|| Arc::new(namer));

        let factory = if self.protocol.requires_tls() {
            Some(self.session_factory(config)?)
        } else {
            None
        };

        Ok((short_namer, TransportSelector::new(self.protocol, factory)))
    }

    fn session_factory(
        &self,
        config: &ChannelConfig,
    ) -> std::result::Result<Arc<dyn SessionFactory>, ConfigError> {
        if let Some(factory) = &self.session_factory {
            return Ok(Arc::clone(factory));
        }
        let default_ssl = SslConfig::default();
        let ssl = config.ssl.as_ref().unwrap_or(&default_ssl);
        Ok(Arc::new(SslFactory::new(self.mode, ssl)?))
    }

    /// Build the channel for a new connection.
    ///
    /// The socket is owned by the returned channel. If construction fails the
    /// socket is shut down, and no state shared with other connections is
    /// affected.
    ///
    /// # Errors
    ///
    /// Returns `NotConfigured` before `configure`, `BuilderClosed` after
    /// `close`, and `ChannelConstructionFailed` wrapping the transport or
    /// authenticator failure otherwise.
    pub fn build_channel<S: RawSocket>(
        &self,
        id: &str,
        mut socket: S,
        max_receive_size: usize,
    ) -> Result<KafkaChannel<S>> {
        let state = self.state.read();
        let configured = match &*state {
            BuilderState::Configured(configured) => configured,
            BuilderState::Unconfigured => {
                close_socket(id, &mut socket);
                return Err(ChannelError::NotConfigured);
            }
            BuilderState::Closed => {
                close_socket(id, &mut socket);
                return Err(ChannelError::BuilderClosed);
            }
        };

        let transport = configured.selector.select(id, socket).map_err(|e| {
            info!(id, error = %e, "failed to create channel");
            ChannelError::construction(id, e)
        })?;

        let authenticator = match SaslAuthenticator::create(
            self.mode,
            id,
            &transport,
            configured.login.subject(),
            configured.short_namer.clone(),
            &configured.config,
        ) {
            Ok(authenticator) => authenticator,
            Err(e) => {
                info!(id, error = %e, "failed to create channel");
                // Drop the TLS session unflushed; nothing reaches the peer
                close_socket(id, &mut transport.into_socket());
                return Err(ChannelError::construction(id, e));
            }
        };

        debug!(id, encrypted = transport.is_encrypted(), role = ?self.mode, "built channel");
        Ok(KafkaChannel::new(id, transport, authenticator, max_receive_size))
    }

    /// Release the shared login and refuse further builds.
    ///
    /// Waits for in-flight builds. Calling `close` again is a no-op.
    pub fn close(&self) {
        let previous = std::mem::replace(&mut *self.state.write(), BuilderState::Closed);
        match previous {
            BuilderState::Configured(configured) => {
                configured.login.release();
                info!(mode = ?self.mode, protocol = ?self.protocol, "closed SASL channel builder");
            }
            BuilderState::Unconfigured => debug!("closed unconfigured channel builder"),
            BuilderState::Closed => debug!("channel builder already closed"),
        }
    }

    /// Role of channels built by this builder.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Protocol of channels built by this builder.
    #[must_use]
    pub fn security_protocol(&self) -> SecurityProtocol {
        self.protocol
    }

    /// Whether `configure` succeeded and `close` has not been called.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        matches!(*self.state.read(), BuilderState::Configured(_))
    }

    /// Whether `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(*self.state.read(), BuilderState::Closed)
    }

    /// The configuration applied by `configure`.
    #[must_use]
    pub fn config(&self) -> Option<Arc<ChannelConfig>> {
        match &*self.state.read() {
            BuilderState::Configured(configured) => Some(Arc::clone(&configured.config)),
            _ => None,
        }
    }

    /// The shared login subject.
    #[must_use]
    pub fn subject(&self) -> Option<Arc<Subject>> {
        match &*self.state.read() {
            BuilderState::Configured(configured) => Some(configured.login.subject()),
            _ => None,
        }
    }

    /// The principal normalizer, `None` without mapping rules.
    #[must_use]
    pub fn short_namer(&self) -> Option<Arc<KerberosShortNamer>> {
        match &*self.state.read() {
            BuilderState::Configured(configured) => configured.short_namer.clone(),
            _ => None,
        }
    }
}

fn close_socket<S: RawSocket>(id: &str, socket: &mut S) {
    if let Err(e) = socket.shutdown() {
        debug!(id, error = %e, "failed to close socket");
    }
}

impl fmt::Debug for SaslChannelBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.state.read() {
            BuilderState::Unconfigured => "Unconfigured",
            BuilderState::Configured(_) => "Configured",
            BuilderState::Closed => "Closed",
        };
        f.debug_struct("SaslChannelBuilder")
            .field("mode", &self.mode)
            .field("protocol", &self.protocol)
            .field("state", &state)
            .finish_non_exhaustive()
    }
}
