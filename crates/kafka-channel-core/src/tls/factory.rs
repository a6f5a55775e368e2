//! Per-connection TLS session creation.

use std::fmt;
use std::sync::Arc;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, Connection, ServerConfig, ServerConnection};
use tracing::debug;

use super::client::build_client_config;
use super::server::build_server_config;
use crate::config::{Mode, SslConfig};
use crate::error::{TlsResult, TransportError};

/// Creates a TLS session for each new connection.
///
/// The peer host and port are used for hostname verification and session
/// resumption on the client side.
pub trait SessionFactory: Send + Sync + fmt::Debug {
    /// Create an unstarted TLS session for a peer.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Session` if the session cannot be created.
    fn create_session(&self, peer_host: &str, peer_port: u16) -> Result<Connection, TransportError>;
}

/// `rustls`-backed session factory for one mode.
#[derive(Clone)]
pub struct SslFactory {
    mode: Mode,
    client: Option<Arc<ClientConfig>>,
    server: Option<Arc<ServerConfig>>,
}

impl SslFactory {
    /// Load certificates and build the TLS configuration for a mode.
    ///
    /// # Errors
    ///
    /// Returns an error if certificates or keys cannot be loaded.
    pub fn new(mode: Mode, config: &SslConfig) -> TlsResult<Self> {
        let factory = match mode {
            Mode::Client => Self {
                mode,
                client: Some(Arc::new(build_client_config(config)?)),
                server: None,
            },
            Mode::Server => Self {
                mode,
                client: None,
                server: Some(Arc::new(build_server_config(config)?)),
            },
        };

        debug!(mode = ?mode, "initialised TLS session factory");
        Ok(factory)
    }

    /// The mode the factory was built for.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }
}

impl SessionFactory for SslFactory {
    fn create_session(
        &self,
        peer_host: &str,
        peer_port: u16,
    ) -> Result<Connection, TransportError> {
        let session_error = |message: String| TransportError::Session {
            peer_host: peer_host.to_string(),
            peer_port,
            message,
        };

        match (&self.client, &self.server) {
            (Some(client), _) => {
                let server_name = ServerName::try_from(peer_host.to_string())
                    .map_err(|e| session_error(format!("invalid server name: {e}")))?;
                let session = ClientConnection::new(Arc::clone(client), server_name)
                    .map_err(|e| session_error(e.to_string()))?;
                Ok(Connection::Client(session))
            }
            (None, Some(server)) => {
                let session = ServerConnection::new(Arc::clone(server))
                    .map_err(|e| session_error(e.to_string()))?;
                Ok(Connection::Server(session))
            }
            (None, None) => Err(TransportError::FactoryNotConfigured),
        }
    }
}

impl fmt::Debug for SslFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SslFactory").field("mode", &self.mode).finish_non_exhaustive()
    }
}
