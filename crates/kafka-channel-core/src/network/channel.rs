//! The per-connection channel handed to the event loop.

use std::io::{self, Read, Write};

use super::socket::RawSocket;
use super::transport::TransportLayer;
use crate::auth::sasl::SaslAuthenticator;

/// A connection with its transport and authenticator attached.
///
/// The channel exclusively owns both; dropping or closing it releases the
/// socket. Reads and writes go through the transport, so the event loop does
/// not need to know whether TLS is in use.
#[derive(Debug)]
pub struct KafkaChannel<S: RawSocket> {
    id: String,
    transport: TransportLayer<S>,
    authenticator: SaslAuthenticator,
    max_receive_size: usize,
}

impl<S: RawSocket> KafkaChannel<S> {
    /// Assemble a channel from its parts.
    pub fn new(
        id: impl Into<String>,
        transport: TransportLayer<S>,
        authenticator: SaslAuthenticator,
        max_receive_size: usize,
    ) -> Self {
        Self {
            id: id.into(),
            transport,
            authenticator,
            max_receive_size,
        }
    }

    /// Connection id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Transport of this channel.
    #[must_use]
    pub fn transport(&self) -> &TransportLayer<S> {
        &self.transport
    }

    /// Mutable transport access for the event loop.
    pub fn transport_mut(&mut self) -> &mut TransportLayer<S> {
        &mut self.transport
    }

    /// Authenticator of this channel.
    #[must_use]
    pub fn authenticator(&self) -> &SaslAuthenticator {
        &self.authenticator
    }

    /// Mutable authenticator access for the event loop.
    pub fn authenticator_mut(&mut self) -> &mut SaslAuthenticator {
        &mut self.authenticator
    }

    /// Upper bound on a single received frame.
    #[must_use]
    pub fn max_receive_size(&self) -> usize {
        self.max_receive_size
    }

    /// Close the transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be shut down.
    pub fn close(&mut self) -> io::Result<()> {
        self.transport.close()
    }
}

impl<S: RawSocket> Read for KafkaChannel<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.transport.read(buf)
    }
}

impl<S: RawSocket> Write for KafkaChannel<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.transport.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.transport.flush()
    }
}
