//! Server-side TLS configuration.
//!
//! A broker-side builder presents its certificate to connecting clients and
//! optionally verifies client certificates against a CA.

use std::path::Path;
use std::sync::Arc;

use rustls::server::danger::ClientCertVerifier;
use rustls::server::WebPkiClientVerifier;
use rustls::ServerConfig;
use tracing::debug;

use super::{ensure_crypto_provider, load_certificates, load_private_key, load_root_store};
use crate::config::SslConfig;
use crate::error::{TlsError, TlsResult};

/// Build a rustls `ServerConfig` from SSL options.
///
/// # Errors
///
/// Returns an error if:
/// - `cert_path` or `key_path` is missing or cannot be loaded
/// - `require_client_cert` is set without a `ca_cert_path`
/// - the CA certificate cannot be loaded
pub fn build_server_config(config: &SslConfig) -> TlsResult<ServerConfig> {
    ensure_crypto_provider();

    let cert_path = config
        .cert_path
        .as_deref()
        .ok_or_else(|| TlsError::Config("ssl.cert_path is required in server mode".to_string()))?;
    let key_path = config
        .key_path
        .as_deref()
        .ok_or_else(|| TlsError::Config("ssl.key_path is required in server mode".to_string()))?;

    let certs = load_certificates(cert_path)?;
    let key = load_private_key(key_path)?;

    let builder = ServerConfig::builder();

    let builder = match (&config.ca_cert_path, config.require_client_cert) {
        (Some(ca_path), required) => {
            debug!(
                ca_path = %ca_path.display(),
                required,
                "configuring client certificate verification"
            );
            builder.with_client_cert_verifier(build_client_verifier(ca_path, required)?)
        }
        (None, true) => {
            return Err(TlsError::Config(
                "ssl.ca_cert_path required when require_client_cert is true".to_string(),
            ));
        }
        (None, false) => builder.with_no_client_auth(),
    };

    builder
        .with_single_cert(certs, key)
        .map_err(|e| TlsError::Config(format!("failed to configure server cert: {e}")))
}

fn build_client_verifier(ca_path: &Path, required: bool) -> TlsResult<Arc<dyn ClientCertVerifier>> {
    let root_store = load_root_store(ca_path)?;
    let builder = WebPkiClientVerifier::builder(Arc::new(root_store));
    let builder = if required {
        builder
    } else {
        builder.allow_unauthenticated()
    };

    builder
        .build()
        .map_err(|e| TlsError::Config(format!("failed to build client verifier: {e}")))
}
