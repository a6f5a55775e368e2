//! Transport selection and the per-connection transport handle.
//!
//! `SASL_PLAINTEXT` channels read and write the raw socket directly.
//! `SASL_SSL` channels bind a fresh `rustls` session to the socket; the
//! handshake itself is driven later by the event loop through `Read`/`Write`.

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;

use rustls::{Connection, Stream};
use tracing::debug;

use super::socket::RawSocket;
use crate::config::SecurityProtocol;
use crate::error::TransportError;
use crate::tls::SessionFactory;

/// A socket, optionally wrapped in a TLS session.
pub enum TransportLayer<S: RawSocket> {
    /// Bytes pass through unchanged.
    Plaintext(S),
    /// Bytes are protected by a TLS session bound to the socket.
    Ssl {
        /// Underlying socket.
        socket: S,
        /// TLS session for this connection.
        session: Box<Connection>,
    },
}

impl<S: RawSocket> TransportLayer<S> {
    /// Whether traffic is encrypted.
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        matches!(self, Self::Ssl { .. })
    }

    /// The raw socket under any TLS layer.
    #[must_use]
    pub fn socket(&self) -> &S {
        match self {
            Self::Plaintext(socket) | Self::Ssl { socket, .. } => socket,
        }
    }

    /// The TLS session, if encrypted.
    #[must_use]
    pub fn session(&self) -> Option<&Connection> {
        match self {
            Self::Plaintext(_) => None,
            Self::Ssl { session, .. } => Some(&**session),
        }
    }

    /// Send `close_notify` if encrypted, then shut down the socket.
    ///
    /// The alert is best effort; a peer that already went away does not
    /// prevent the socket from being closed.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be shut down.
    pub fn close(&mut self) -> io::Result<()> {
        match self {
            Self::Plaintext(socket) => socket.shutdown(),
            Self::Ssl { socket, session } => {
                session.send_close_notify();
                while session.wants_write() {
                    match session.write_tls(socket) {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {}
                    }
                }
                socket.shutdown()
            }
        }
    }

    /// Give up the TLS layer, returning the socket.
    #[must_use]
    pub fn into_socket(self) -> S {
        match self {
            Self::Plaintext(socket) | Self::Ssl { socket, .. } => socket,
        }
    }
}

impl<S: RawSocket> Read for TransportLayer<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plaintext(socket) => socket.read(buf),
            Self::Ssl { socket, session } => match session.as_mut() {
                Connection::Client(conn) => Stream::new(conn, socket).read(buf),
                Connection::Server(conn) => Stream::new(conn, socket).read(buf),
            },
        }
    }
}

impl<S: RawSocket> Write for TransportLayer<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plaintext(socket) => socket.write(buf),
            Self::Ssl { socket, session } => match session.as_mut() {
                Connection::Client(conn) => Stream::new(conn, socket).write(buf),
                Connection::Server(conn) => Stream::new(conn, socket).write(buf),
            },
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plaintext(socket) => socket.flush(),
            Self::Ssl { socket, session } => match session.as_mut() {
                Connection::Client(conn) => Stream::new(conn, socket).flush(),
                Connection::Server(conn) => Stream::new(conn, socket).flush(),
            },
        }
    }
}

impl<S: RawSocket> fmt::Debug for TransportLayer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plaintext(socket) => f.debug_tuple("Plaintext").field(socket).finish(),
            Self::Ssl { socket, session } => f
                .debug_struct("Ssl")
                .field("socket", socket)
                .field("handshaking", &session.is_handshaking())
                .finish(),
        }
    }
}

/// Chooses the transport for each new connection.
///
/// Holds only the protocol and the session factory; it never touches
/// credentials.
#[derive(Clone)]
pub struct TransportSelector {
    protocol: SecurityProtocol,
    factory: Option<Arc<dyn SessionFactory>>,
}

impl TransportSelector {
    /// Create a selector for a protocol.
    ///
    /// `factory` is required for encrypted protocols and ignored otherwise.
    #[must_use]
    pub fn new(protocol: SecurityProtocol, factory: Option<Arc<dyn SessionFactory>>) -> Self {
        Self { protocol, factory }
    }

    /// The protocol this selector serves.
    #[must_use]
    pub fn protocol(&self) -> SecurityProtocol {
        self.protocol
    }

    /// Wrap `socket` in the transport for the configured protocol.
    ///
    /// On failure the socket is shut down before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns `FactoryNotConfigured` if encryption is required without a
    /// factory, `PeerResolution` if the peer address cannot be read, or
    /// `Session` if the factory refuses to create a session.
    pub fn select<S: RawSocket>(
        &self,
        id: &str,
        mut socket: S,
    ) -> Result<TransportLayer<S>, TransportError> {
        if !self.protocol.requires_tls() {
            debug!(id, "selected plaintext transport");
            return Ok(TransportLayer::Plaintext(socket));
        }

        match self.create_session(&socket) {
            Ok(session) => {
                debug!(id, "selected TLS transport");
                Ok(TransportLayer::Ssl {
                    socket,
                    session: Box::new(session),
                })
            }
            Err(e) => {
                if let Err(close_err) = socket.shutdown() {
                    debug!(id, error = %close_err, "failed to close socket");
                }
                Err(e)
            }
        }
    }

    fn create_session<S: RawSocket>(&self, socket: &S) -> Result<Connection, TransportError> {
        let factory = self
            .factory
            .as_ref()
            .ok_or(TransportError::FactoryNotConfigured)?;
        let peer_host = socket.peer_host().map_err(TransportError::PeerResolution)?;
        let peer_port = socket.peer_port().map_err(TransportError::PeerResolution)?;
        factory.create_session(&peer_host, peer_port)
    }
}

impl fmt::Debug for TransportSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSelector")
            .field("protocol", &self.protocol)
            .field("factory", &self.factory)
            .finish()
    }
}
