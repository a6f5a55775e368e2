//! Client-side TLS configuration.
//!
//! Verifies brokers against a custom CA when one is configured and the webpki
//! roots otherwise. A certificate and key pair, when both are present, is
//! presented for mutual TLS.

use rustls::{ClientConfig, RootCertStore};
use tracing::debug;

use super::{ensure_crypto_provider, load_certificates, load_private_key, load_root_store};
use crate::config::SslConfig;
use crate::error::{TlsError, TlsResult};

/// Build a rustls `ClientConfig` from SSL options.
///
/// # Errors
///
/// Returns an error if a configured CA, certificate or key cannot be loaded.
pub fn build_client_config(config: &SslConfig) -> TlsResult<ClientConfig> {
    ensure_crypto_provider();

    let root_store = match &config.ca_cert_path {
        Some(ca_path) => load_root_store(ca_path)?,
        None => {
            debug!("using webpki root certificates");
            let mut root_store = RootCertStore::empty();
            root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            root_store
        }
    };

    let builder = ClientConfig::builder().with_root_certificates(root_store);

    match (&config.cert_path, &config.key_path) {
        (Some(cert_path), Some(key_path)) => {
            debug!(cert_path = %cert_path.display(), "loading client certificate for mTLS");
            let certs = load_certificates(cert_path)?;
            let key = load_private_key(key_path)?;
            builder
                .with_client_auth_cert(certs, key)
                .map_err(|e| TlsError::Config(format!("failed to configure client auth: {e}")))
        }
        _ => Ok(builder.with_no_client_auth()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::test_support::{cert_file, key_file};
    use std::path::PathBuf;

    #[test]
    fn test_client_with_webpki_roots() {
        let result = build_client_config(&SslConfig::default());
        assert!(result.is_ok(), "Expected Ok, got: {:?}", result.err());
    }

    #[test]
    fn test_client_with_custom_ca() {
        let ca = cert_file();
        let config = SslConfig {
            ca_cert_path: Some(ca.path().to_path_buf()),
            ..Default::default()
        };
        assert!(build_client_config(&config).is_ok());
    }

    #[test]
    fn test_client_with_certificate() {
        let cert = cert_file();
        let key = key_file();
        let config = SslConfig {
            cert_path: Some(cert.path().to_path_buf()),
            key_path: Some(key.path().to_path_buf()),
            ..Default::default()
        };
        let result = build_client_config(&config);
        assert!(result.is_ok(), "Expected Ok, got: {:?}", result.err());
    }

    #[test]
    fn test_client_certificate_without_key_is_ignored() {
        let cert = cert_file();
        let config = SslConfig {
            cert_path: Some(cert.path().to_path_buf()),
            ..Default::default()
        };
        assert!(build_client_config(&config).is_ok());
    }

    #[test]
    fn test_client_missing_ca() {
        let config = SslConfig {
            ca_cert_path: Some(PathBuf::from("/nonexistent/ca.pem")),
            ..Default::default()
        };
        assert!(matches!(
            build_client_config(&config),
            Err(TlsError::CertificateLoad { .. })
        ));
    }
}
