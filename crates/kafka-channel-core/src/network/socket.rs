//! Raw connected sockets handed to the channel builder.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};

/// An accepted or connected byte stream.
///
/// The builder takes ownership of the socket when a channel is built, and
/// shuts it down if construction fails.
pub trait RawSocket: Read + Write + Send + fmt::Debug {
    /// Remote address of the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket is no longer connected.
    fn peer_addr(&self) -> io::Result<SocketAddr>;

    /// Host name used for TLS verification and the Kerberos service principal.
    ///
    /// Defaults to the textual IP address. No reverse lookup is performed.
    ///
    /// # Errors
    ///
    /// Returns an error if the peer address cannot be read.
    fn peer_host(&self) -> io::Result<String> {
        self.peer_addr().map(|addr| addr.ip().to_string())
    }

    /// Remote port of the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the peer address cannot be read.
    fn peer_port(&self) -> io::Result<u16> {
        self.peer_addr().map(|addr| addr.port())
    }

    /// Close both directions of the socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be shut down.
    fn shutdown(&mut self) -> io::Result<()>;
}

impl RawSocket for TcpStream {
    fn peer_addr(&self) -> io::Result<SocketAddr> {
        TcpStream::peer_addr(self)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        match TcpStream::shutdown(self, Shutdown::Both) {
            // Already closed by the peer
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_tcp_stream_peer_identity() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (_server, _) = listener.accept().unwrap();

        assert_eq!(RawSocket::peer_host(&client).unwrap(), "127.0.0.1");
        assert_eq!(RawSocket::peer_port(&client).unwrap(), addr.port());
    }

    #[test]
    fn test_tcp_stream_shutdown_twice() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (_server, _) = listener.accept().unwrap();

        RawSocket::shutdown(&mut client).unwrap();
        RawSocket::shutdown(&mut client).unwrap();
    }
}
