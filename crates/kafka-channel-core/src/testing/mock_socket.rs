//! In-memory socket for builder tests.

use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::network::RawSocket;

#[derive(Debug, Default)]
struct SocketState {
    inbound: Vec<u8>,
    written: Vec<u8>,
    shutdowns: usize,
}

/// A socket whose clones share state, so tests keep a handle after the
/// builder takes ownership.
#[derive(Debug, Clone)]
pub struct MockSocket {
    peer: Option<SocketAddr>,
    host: Option<String>,
    state: Arc<Mutex<SocketState>>,
}

impl MockSocket {
    /// A socket connected to `peer`.
    #[must_use]
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            peer: Some(peer),
            host: None,
            state: Arc::new(Mutex::new(SocketState::default())),
        }
    }

    /// A socket whose peer address cannot be read.
    #[must_use]
    pub fn unresolvable() -> Self {
        Self {
            peer: None,
            host: None,
            state: Arc::new(Mutex::new(SocketState::default())),
        }
    }

    /// Report `host` as the peer host name instead of the IP address.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Queue bytes to be returned by reads.
    pub fn push_inbound(&self, bytes: &[u8]) {
        self.state.lock().inbound.extend_from_slice(bytes);
    }

    /// Bytes written so far.
    #[must_use]
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().written.clone()
    }

    /// Whether the socket has been shut down.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().shutdowns > 0
    }

    /// Number of shutdown calls.
    #[must_use]
    pub fn shutdown_count(&self) -> usize {
        self.state.lock().shutdowns
    }
}

impl Read for MockSocket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        if state.shutdowns > 0 {
            return Ok(0);
        }
        if state.inbound.is_empty() {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        let n = buf.len().min(state.inbound.len());
        buf[..n].copy_from_slice(&state.inbound[..n]);
        state.inbound.drain(..n);
        Ok(n)
    }
}

impl Write for MockSocket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        if state.shutdowns > 0 {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        state.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl RawSocket for MockSocket {
    fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.peer
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "socket is not connected"))
    }

    fn peer_host(&self) -> io::Result<String> {
        match &self.host {
            Some(host) => Ok(host.clone()),
            None => self.peer_addr().map(|addr| addr.ip().to_string()),
        }
    }

    fn shutdown(&mut self) -> io::Result<()> {
        self.state.lock().shutdowns += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let socket = MockSocket::new("10.0.0.5:50000".parse().unwrap());
        let mut owned = socket.clone();

        owned.write_all(b"hello").unwrap();
        RawSocket::shutdown(&mut owned).unwrap();

        assert_eq!(socket.written(), b"hello");
        assert!(socket.is_closed());
        assert_eq!(socket.shutdown_count(), 1);
    }

    #[test]
    fn test_read_inbound() {
        let mut socket = MockSocket::new("10.0.0.5:50000".parse().unwrap());
        socket.push_inbound(b"abc");

        let mut buf = [0u8; 8];
        assert_eq!(socket.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(
            socket.read(&mut buf).unwrap_err().kind(),
            io::ErrorKind::WouldBlock
        );
    }

    #[test]
    fn test_peer_identity() {
        let socket = MockSocket::new("10.0.0.5:50000".parse().unwrap());
        assert_eq!(socket.peer_host().unwrap(), "10.0.0.5");
        assert_eq!(socket.peer_port().unwrap(), 50000);

        let named = socket.with_host("client.example.com");
        assert_eq!(named.peer_host().unwrap(), "client.example.com");

        assert!(MockSocket::unresolvable().peer_host().is_err());
    }
}
