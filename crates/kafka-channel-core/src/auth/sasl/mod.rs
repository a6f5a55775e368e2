//! SASL authenticators attached to new channels.
//!
//! The byte-level handshake is driven by the event loop; this module decides
//! which side of the exchange a channel runs and validates it against the
//! transport before the channel is handed out.
//!
//! - [`SaslClientAuthenticator`] - authenticates to a broker as the login subject
//! - [`SaslServerAuthenticator`] - authenticates clients and maps their
//!   principals through the Kerberos short namer

pub mod client;
pub mod server;

pub use client::SaslClientAuthenticator;
pub use server::SaslServerAuthenticator;

use std::sync::Arc;

use crate::auth::kerberos::KerberosShortNamer;
use crate::auth::login_manager::Subject;
use crate::auth::principal::Principal;
use crate::config::{ChannelConfig, Mode};
use crate::error::AuthError;
use crate::network::{RawSocket, TransportLayer};

/// The authenticator of one channel, by role.
#[derive(Debug)]
pub enum SaslAuthenticator {
    /// Outbound connection to a broker.
    Client(SaslClientAuthenticator),
    /// Inbound connection from a client.
    Server(SaslServerAuthenticator),
}

impl SaslAuthenticator {
    /// Create the authenticator for `mode` and configure it against the
    /// transport immediately.
    ///
    /// Clients read the peer host from the raw socket. Servers receive the
    /// short namer, which is `None` when no mapping rules are configured.
    ///
    /// # Errors
    ///
    /// Returns `PeerResolution` if a client cannot read the peer host, or any
    /// error raised while configuring the authenticator.
    pub fn create<S: RawSocket>(
        mode: Mode,
        id: &str,
        transport: &TransportLayer<S>,
        subject: Arc<Subject>,
        short_namer: Option<Arc<KerberosShortNamer>>,
        config: &ChannelConfig,
    ) -> Result<Self, AuthError> {
        let encrypted = transport.is_encrypted();

        match mode {
            Mode::Server => {
                let mut authenticator = SaslServerAuthenticator::new(id, subject, short_namer);
                authenticator.configure(encrypted, config)?;
                Ok(Self::Server(authenticator))
            }
            Mode::Client => {
                let peer_host = transport
                    .socket()
                    .peer_host()
                    .map_err(AuthError::PeerResolution)?;
                let service_name = subject.service_name().map(str::to_string);
                let mut authenticator =
                    SaslClientAuthenticator::new(id, subject, service_name.as_deref(), peer_host);
                authenticator.configure(encrypted, config)?;
                Ok(Self::Client(authenticator))
            }
        }
    }

    /// The role this authenticator plays.
    #[must_use]
    pub fn role(&self) -> Mode {
        match self {
            Self::Client(_) => Mode::Client,
            Self::Server(_) => Mode::Server,
        }
    }

    /// Connection id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Client(auth) => auth.id(),
            Self::Server(auth) => auth.id(),
        }
    }

    /// Shared login subject.
    #[must_use]
    pub fn subject(&self) -> &Arc<Subject> {
        match self {
            Self::Client(auth) => auth.subject(),
            Self::Server(auth) => auth.subject(),
        }
    }

    /// The principal of this side of the exchange.
    ///
    /// For servers this is the authenticated client, anonymous until the
    /// exchange completes.
    #[must_use]
    pub fn principal(&self) -> Principal {
        match self {
            Self::Client(auth) => auth.principal(),
            Self::Server(auth) => auth.principal(),
        }
    }

    /// The client authenticator, if this is one.
    #[must_use]
    pub fn as_client(&self) -> Option<&SaslClientAuthenticator> {
        match self {
            Self::Client(auth) => Some(auth),
            Self::Server(_) => None,
        }
    }

    /// The server authenticator, if this is one.
    #[must_use]
    pub fn as_server(&self) -> Option<&SaslServerAuthenticator> {
        match self {
            Self::Client(_) => None,
            Self::Server(auth) => Some(auth),
        }
    }

    /// Mutable access to the server authenticator.
    pub fn as_server_mut(&mut self) -> Option<&mut SaslServerAuthenticator> {
        match self {
            Self::Client(_) => None,
            Self::Server(auth) => Some(auth),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityProtocol;
    use crate::testing::MockSocket;

    fn subject(mode: Mode) -> Arc<Subject> {
        Arc::new(Subject::new(mode, "kafka/host@EXAMPLE.COM", Some("kafka".to_string()), None))
    }

    #[test]
    fn test_server_role() {
        let transport =
            TransportLayer::Plaintext(MockSocket::new("10.0.0.5:50000".parse().unwrap()));
        let config = ChannelConfig::new(SecurityProtocol::SaslPlaintext, Mode::Server);

        let auth = SaslAuthenticator::create(
            Mode::Server,
            "conn-1",
            &transport,
            subject(Mode::Server),
            None,
            &config,
        )
        .unwrap();

        assert_eq!(auth.role(), Mode::Server);
        assert_eq!(auth.id(), "conn-1");
        assert!(auth.as_server().unwrap().short_namer().is_none());
        assert!(auth.principal().is_anonymous());
    }

    #[test]
    fn test_client_reads_peer_host_from_socket() {
        let socket =
            MockSocket::new("10.0.0.5:9092".parse().unwrap()).with_host("broker1.example.com");
        let transport = TransportLayer::Plaintext(socket);
        let config = ChannelConfig::new(SecurityProtocol::SaslPlaintext, Mode::Client);

        let auth = SaslAuthenticator::create(
            Mode::Client,
            "conn-2",
            &transport,
            subject(Mode::Client),
            None,
            &config,
        )
        .unwrap();

        assert_eq!(auth.role(), Mode::Client);
        let client = auth.as_client().unwrap();
        assert_eq!(client.peer_host(), "broker1.example.com");
        assert_eq!(client.server_principal().as_deref(), Some("kafka/broker1.example.com"));
    }

    #[test]
    fn test_client_unresolvable_peer() {
        let transport = TransportLayer::Plaintext(MockSocket::unresolvable());
        let config = ChannelConfig::new(SecurityProtocol::SaslPlaintext, Mode::Client);

        let result = SaslAuthenticator::create(
            Mode::Client,
            "conn-3",
            &transport,
            subject(Mode::Client),
            None,
            &config,
        );
        assert!(matches!(result, Err(AuthError::PeerResolution(_))));
    }
}
