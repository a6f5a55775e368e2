//! TLS session factory for `SASL_SSL` channels.
//!
//! The factory is initialised once while the channel builder is configured
//! and then creates one `rustls` session per connection:
//!
//! - **Client mode** (`client` module): sessions verify the broker against a
//!   custom CA or the webpki roots, optionally presenting a client certificate
//! - **Server mode** (`server` module): sessions present the broker
//!   certificate, optionally verifying client certificates
//!
//! # Usage
//!
//! ```rust,ignore
//! use kafka_channel_core::config::{Mode, SslConfig};
//! use kafka_channel_core::tls::{SessionFactory, SslFactory};
//!
//! let factory = SslFactory::new(Mode::Client, &SslConfig::default())?;
//! let session = factory.create_session("broker1.example.com", 9093)?;
//! ```

pub mod client;
pub mod factory;
pub mod server;

pub use factory::{SessionFactory, SslFactory};

use std::io::BufReader;
use std::path::Path;

use rustls::crypto::ring::default_provider;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::RootCertStore;
use tracing::{debug, warn};

use crate::error::{TlsError, TlsResult};

/// Install the ring crypto provider if not already installed.
fn ensure_crypto_provider() {
    // Another component may already have installed a provider
    let _ = CryptoProvider::install_default(default_provider());
}

/// Build a root store from a CA file.
fn load_root_store(ca_path: &Path) -> TlsResult<RootCertStore> {
    let mut root_store = RootCertStore::empty();

    debug!(path = %ca_path.display(), "loading CA certificate");
    let certs = load_certificates(ca_path)?;
    let (added, _ignored) = root_store.add_parsable_certificates(certs);
    debug!(added, "added CA certificates to trust store");

    if added == 0 {
        return Err(TlsError::NoCertificates(ca_path.display().to_string()));
    }

    Ok(root_store)
}

/// Load certificates from a PEM file.
fn load_certificates(path: &Path) -> TlsResult<Vec<CertificateDer<'static>>> {
    let file = std::fs::File::open(path).map_err(|e| TlsError::CertificateLoad {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let mut reader = BufReader::new(file);
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut reader)
        .filter_map(|result| match result {
            Ok(cert) => Some(cert),
            Err(e) => {
                warn!(error = %e, "skipping invalid certificate");
                None
            }
        })
        .collect();

    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.display().to_string()));
    }

    debug!(count = certs.len(), path = %path.display(), "loaded certificates");
    Ok(certs)
}

/// Load a private key (PKCS#1, PKCS#8 or SEC1) from a PEM file.
fn load_private_key(path: &Path) -> TlsResult<PrivateKeyDer<'static>> {
    let file = std::fs::File::open(path).map_err(|e| TlsError::PrivateKeyLoad {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let mut reader = BufReader::new(file);

    loop {
        match rustls_pemfile::read_one(&mut reader) {
            Ok(Some(rustls_pemfile::Item::Pkcs1Key(key))) => return Ok(PrivateKeyDer::Pkcs1(key)),
            Ok(Some(rustls_pemfile::Item::Pkcs8Key(key))) => return Ok(PrivateKeyDer::Pkcs8(key)),
            Ok(Some(rustls_pemfile::Item::Sec1Key(key))) => return Ok(PrivateKeyDer::Sec1(key)),
            // Certificates and other items may share the file
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(e) => {
                return Err(TlsError::PrivateKeyLoad {
                    path: path.display().to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    Err(TlsError::NoPrivateKeys(path.display().to_string()))
}
