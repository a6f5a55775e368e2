//! Server-side SASL authenticator.

use std::sync::Arc;

use tracing::{debug, info};

use crate::auth::kerberos::KerberosShortNamer;
use crate::auth::login_manager::Subject;
use crate::auth::principal::{AuthMethod, Principal};
use crate::config::{ChannelConfig, SaslMechanism};
use crate::error::AuthError;

/// Drives the broker side of a SASL exchange with one client.
///
/// Authenticated Kerberos principals are mapped to local names through the
/// shared short namer. Without a namer, principals are used as-is.
#[derive(Debug)]
pub struct SaslServerAuthenticator {
    id: String,
    subject: Arc<Subject>,
    short_namer: Option<Arc<KerberosShortNamer>>,
    enabled_mechanisms: Vec<SaslMechanism>,
    mechanism: Option<SaslMechanism>,
    encrypted: bool,
    principal: Option<Principal>,
}

impl SaslServerAuthenticator {
    /// Create an unconfigured authenticator.
    pub fn new(
        id: impl Into<String>,
        subject: Arc<Subject>,
        short_namer: Option<Arc<KerberosShortNamer>>,
    ) -> Self {
        Self {
            id: id.into(),
            subject,
            short_namer,
            enabled_mechanisms: Vec::new(),
            mechanism: None,
            encrypted: false,
            principal: None,
        }
    }

    /// Load the enabled mechanisms and check they can be served.
    ///
    /// # Errors
    ///
    /// Returns `CredentialReleased` if the shared login was torn down,
    /// `NoMechanisms` if nothing is enabled, or `MissingServiceName` if GSSAPI
    /// is enabled without a service name.
    pub fn configure(&mut self, encrypted: bool, config: &ChannelConfig) -> Result<(), AuthError> {
        if self.subject.is_logged_out() {
            return Err(AuthError::CredentialReleased(self.subject.principal().to_string()));
        }

        let enabled = &config.sasl.enabled_mechanisms;
        if enabled.is_empty() {
            return Err(AuthError::NoMechanisms);
        }
        if enabled.iter().any(SaslMechanism::requires_service_name)
            && self.subject.service_name().is_none()
        {
            return Err(AuthError::MissingServiceName);
        }

        debug!(
            id = %self.id,
            mechanisms = ?enabled,
            encrypted,
            "configured SASL server authenticator"
        );
        self.enabled_mechanisms = enabled.clone();
        self.encrypted = encrypted;
        Ok(())
    }

    /// Pick the mechanism a client asked for in its handshake.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedMechanism` if the name is not enabled.
    pub fn select_mechanism(&mut self, requested: &str) -> Result<SaslMechanism, AuthError> {
        let mechanism = self
            .enabled_mechanisms
            .iter()
            .copied()
            .find(|m| m.mechanism_name() == requested)
            .ok_or_else(|| AuthError::UnsupportedMechanism(requested.to_string()))?;
        self.mechanism = Some(mechanism);
        Ok(mechanism)
    }

    /// Map an authenticated principal name to the local principal.
    ///
    /// # Errors
    ///
    /// Returns `Mapping` if the short namer rejects the name.
    pub fn map_principal(&self, authenticated: &str) -> Result<Principal, AuthError> {
        let name = match &self.short_namer {
            Some(namer) => namer.short_name(authenticated)?,
            None => authenticated.to_string(),
        };
        Ok(Principal::new(name, AuthMethod::for_transport(self.encrypted)))
    }

    /// Record the outcome of a successful exchange.
    ///
    /// # Errors
    ///
    /// Returns `Mapping` if the short namer rejects the name.
    pub fn authenticated(&mut self, authenticated: &str) -> Result<&Principal, AuthError> {
        let principal = self.map_principal(authenticated)?;
        info!(id = %self.id, principal = %principal, "SASL authentication complete");
        Ok(self.principal.insert(principal))
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

    /// Normalizer applied to authenticated principals.
    #[must_use]
    pub fn short_namer(&self) -> Option<&Arc<KerberosShortNamer>> {
        self.short_namer.as_ref()
    }

    /// Mechanisms offered to clients.
    #[must_use]
    pub fn enabled_mechanisms(&self) -> &[SaslMechanism] {
        &self.enabled_mechanisms
    }

    /// Mechanism chosen by the client, once known.
    #[must_use]
    pub fn mechanism(&self) -> Option<SaslMechanism> {
        self.mechanism
    }

    /// The authenticated principal, or anonymous before completion.
    #[must_use]
    pub fn principal(&self) -> Principal {
        self.principal.clone().unwrap_or_else(Principal::anonymous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::kerberos::ShortNameError;
    use crate::config::{Mode, SecurityProtocol};

    fn subject() -> Arc<Subject> {
        Arc::new(Subject::new(
            Mode::Server,
            "kafka/broker1.example.com@EXAMPLE.COM",
            Some("kafka".to_string()),
            None,
        ))
    }

    fn config() -> ChannelConfig {
        let mut config = ChannelConfig::new(SecurityProtocol::SaslPlaintext, Mode::Server);
        config.sasl.enabled_mechanisms = vec![SaslMechanism::Gssapi, SaslMechanism::Plain];
        config
    }

    fn namer(rules: &[&str]) -> Arc<KerberosShortNamer> {
        let rules: Vec<String> = rules.iter().map(|r| (*r).to_string()).collect();
        Arc::new(KerberosShortNamer::from_unparsed_rules("EXAMPLE.COM", Some(&rules)).unwrap())
    }

    #[test]
    fn test_map_principal_through_rules() {
        let mut auth = SaslServerAuthenticator::new("conn-1", subject(), Some(namer(&["DEFAULT"])));
        auth.configure(true, &config()).unwrap();

        let principal = auth.map_principal("alice@EXAMPLE.COM").unwrap();
        assert_eq!(principal.name, "alice");
        assert_eq!(principal.auth_method, AuthMethod::SaslSsl);
    }

    #[test]
    fn test_map_principal_without_namer() {
        let mut auth = SaslServerAuthenticator::new("conn-1", subject(), None);
        auth.configure(false, &config()).unwrap();

        let principal = auth.map_principal("alice@OTHER.ORG").unwrap();
        assert_eq!(principal.name, "alice@OTHER.ORG");
        assert_eq!(principal.auth_method, AuthMethod::Sasl);
    }

    #[test]
    fn test_map_principal_no_matching_rule() {
        let auth = SaslServerAuthenticator::new("conn-1", subject(), Some(namer(&["DEFAULT"])));
        assert!(matches!(
            auth.map_principal("alice@OTHER.ORG"),
            Err(AuthError::Mapping(ShortNameError::NoMatchingRule(_)))
        ));
    }

    #[test]
    fn test_authenticated_records_principal() {
        let mut auth = SaslServerAuthenticator::new("conn-1", subject(), Some(namer(&["DEFAULT"])));
        auth.configure(false, &config()).unwrap();
        assert!(auth.principal().is_anonymous());

        auth.authenticated("bob@EXAMPLE.COM").unwrap();
        assert_eq!(auth.principal().to_string(), "User:bob");
    }

    #[test]
    fn test_select_mechanism() {
        let mut auth = SaslServerAuthenticator::new("conn-1", subject(), None);
        auth.configure(false, &config()).unwrap();

        assert_eq!(auth.select_mechanism("PLAIN").unwrap(), SaslMechanism::Plain);
        assert_eq!(auth.mechanism(), Some(SaslMechanism::Plain));
        assert!(matches!(
            auth.select_mechanism("SCRAM-SHA-512"),
            Err(AuthError::UnsupportedMechanism(name)) if name == "SCRAM-SHA-512"
        ));
    }

    #[test]
    fn test_configure_requires_mechanisms() {
        let mut config = config();
        config.sasl.enabled_mechanisms.clear();

        let mut auth = SaslServerAuthenticator::new("conn-1", subject(), None);
        assert!(matches!(auth.configure(false, &config), Err(AuthError::NoMechanisms)));
    }

    #[test]
    fn test_gssapi_requires_service_name() {
        let subject = Arc::new(Subject::new(Mode::Server, "kafka@EXAMPLE.COM", None, None));
        let mut auth = SaslServerAuthenticator::new("conn-1", subject, None);
        assert!(matches!(
            auth.configure(false, &config()),
            Err(AuthError::MissingServiceName)
        ));
    }
}
