//! Client-side SASL authenticator.

use std::sync::Arc;

use tracing::debug;

use crate::auth::login_manager::Subject;
use crate::auth::principal::{AuthMethod, Principal};
use crate::config::{ChannelConfig, SaslMechanism};
use crate::error::AuthError;

/// Drives the client side of a SASL exchange with one broker.
///
/// For GSSAPI the broker's service principal is `service_name/peer_host`,
/// where `peer_host` comes from the raw socket rather than the TLS layer.
#[derive(Debug)]
pub struct SaslClientAuthenticator {
    id: String,
    subject: Arc<Subject>,
    service_name: Option<String>,
    peer_host: String,
    mechanism: Option<SaslMechanism>,
    encrypted: bool,
}

impl SaslClientAuthenticator {
    /// Create an unconfigured authenticator.
    pub fn new(
        id: impl Into<String>,
        subject: Arc<Subject>,
        service_name: Option<&str>,
        peer_host: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            subject,
            service_name: service_name.map(str::to_string),
            peer_host: peer_host.into(),
            mechanism: None,
            encrypted: false,
        }
    }

    /// Validate the client mechanism against the transport and credential.
    ///
    /// # Errors
    ///
    /// Returns `CredentialReleased` if the shared login was torn down, or
    /// `MissingServiceName` if GSSAPI is used without a service name.
    pub fn configure(&mut self, encrypted: bool, config: &ChannelConfig) -> Result<(), AuthError> {
        if self.subject.is_logged_out() {
            return Err(AuthError::CredentialReleased(self.subject.principal().to_string()));
        }

        let mechanism = config.sasl.mechanism;
        if mechanism.requires_service_name() && self.service_name.is_none() {
            return Err(AuthError::MissingServiceName);
        }

        debug!(
            id = %self.id,
            mechanism = mechanism.mechanism_name(),
            peer_host = %self.peer_host,
            encrypted,
            "configured SASL client authenticator"
        );
        self.mechanism = Some(mechanism);
        self.encrypted = encrypted;
        Ok(())
    }

    /// Connection id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Shared login subject.
    #[must_use]
    pub fn subject(&self) -> &Arc<Subject> {
        &self.subject
    }

    /// Kerberos service name of the broker.
    #[must_use]
    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    /// Host name of the broker as seen by the socket.
    #[must_use]
    pub fn peer_host(&self) -> &str {
        &self.peer_host
    }

    /// Mechanism selected by `configure`.
    #[must_use]
    pub fn mechanism(&self) -> Option<SaslMechanism> {
        self.mechanism
    }

    /// Service principal of the broker, `service/host`.
    #[must_use]
    pub fn server_principal(&self) -> Option<String> {
        self.service_name
            .as_ref()
            .map(|service| format!("{service}/{}", self.peer_host))
    }

    /// The identity this client authenticates as.
    #[must_use]
    pub fn principal(&self) -> Principal {
        Principal::new(
            self.subject.principal(),
            AuthMethod::for_transport(self.encrypted),
        )
    }
}
