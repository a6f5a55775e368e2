//! Session factory that records the peers it creates sessions for.

use std::sync::Arc;

use parking_lot::Mutex;
use rustls::Connection;

use crate::config::{Mode, SslConfig};
use crate::error::TransportError;
use crate::tls::{SessionFactory, SslFactory};

/// Wraps a client-mode [`SslFactory`] using the webpki roots, or fails every
/// request.
#[derive(Debug, Clone)]
pub struct RecordingSessionFactory {
    inner: Option<SslFactory>,
    requests: Arc<Mutex<Vec<(String, u16)>>>,
}

impl RecordingSessionFactory {
    /// A factory that creates real client sessions.
    ///
    /// # Panics
    ///
    /// Panics if the default client TLS configuration cannot be built.
    #[must_use]
    pub fn new() -> Self {
        let inner = SslFactory::new(Mode::Client, &SslConfig::default())
            .expect("default client TLS configuration");
        Self {
            inner: Some(inner),
            requests: Arc::default(),
        }
    }

    /// A factory that refuses every session.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            inner: None,
            requests: Arc::default(),
        }
    }

    /// `(peer_host, peer_port)` of every request, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<(String, u16)> {
        self.requests.lock().clone()
    }
}

impl Default for RecordingSessionFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionFactory for RecordingSessionFactory {
    fn create_session(
        &self,
        peer_host: &str,
        peer_port: u16,
    ) -> Result<Connection, TransportError> {
        self.requests.lock().push((peer_host.to_string(), peer_port));
        match &self.inner {
            Some(inner) => inner.create_session(peer_host, peer_port),
            None => Err(TransportError::Session {
                peer_host: peer_host.to_string(),
                peer_port,
                message: "session creation disabled".to_string(),
            }),
        }
    }
}
