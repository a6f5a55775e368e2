//! Configuration types for the SASL channel builder.
//!
//! Configuration is loaded from YAML files and validated before use. Once
//! handed to [`SaslChannelBuilder::configure`](crate::network::SaslChannelBuilder::configure)
//! it is frozen behind an `Arc` and shared by every channel built afterwards.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};

/// Default upper bound on a single received frame (Kafka's `socket.request.max.bytes`).
pub const DEFAULT_MAX_RECEIVE_SIZE: usize = 100 * 1024 * 1024;

/// Root configuration for a channel builder.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChannelConfig {
    /// Security protocol used for every channel built from this configuration.
    pub security_protocol: SecurityProtocol,

    /// Whether channels initiate (client) or accept (server) connections.
    pub mode: Mode,

    /// SASL options.
    #[serde(default)]
    pub sasl: SaslConfig,

    /// TLS options, passed through to the session factory for `SASL_SSL`.
    #[serde(default)]
    pub ssl: Option<SslConfig>,

    /// Listener options used by the CLI accept loop.
    #[serde(default)]
    pub listen: ListenConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Security protocol for Kafka connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityProtocol {
    /// Plain TCP without encryption or authentication.
    #[default]
    Plaintext,
    /// TLS encryption without SASL authentication.
    Ssl,
    /// SASL authentication without TLS encryption.
    SaslPlaintext,
    /// TLS encryption with SASL authentication.
    SaslSsl,
}

impl SecurityProtocol {
    /// Check if TLS is required for this protocol.
    #[must_use]
    pub fn requires_tls(&self) -> bool {
        matches!(self, Self::Ssl | Self::SaslSsl)
    }

    /// Check if SASL is required for this protocol.
    #[must_use]
    pub fn requires_sasl(&self) -> bool {
        matches!(self, Self::SaslPlaintext | Self::SaslSsl)
    }
}

/// Connection role of the local endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    /// Initiates connections.
    Client,
    /// Accepts connections.
    Server,
}

/// SASL authentication mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
pub enum SaslMechanism {
    /// Kerberos via GSSAPI.
    #[default]
    #[serde(rename = "GSSAPI")]
    Gssapi,
    /// SASL/PLAIN - simple username/password authentication.
    #[serde(rename = "PLAIN")]
    Plain,
    /// SASL/SCRAM-SHA-256 - salted challenge-response authentication.
    #[serde(rename = "SCRAM-SHA-256")]
    ScramSha256,
    /// SASL/SCRAM-SHA-512 - salted challenge-response authentication.
    #[serde(rename = "SCRAM-SHA-512")]
    ScramSha512,
    /// OAuth 2.0 bearer tokens.
    #[serde(rename = "OAUTHBEARER")]
    OAuthBearer,
}

impl SaslMechanism {
    /// Get the Kafka mechanism name as used in the SASL handshake.
    #[must_use]
    pub fn mechanism_name(&self) -> &'static str {
        match self {
            Self::Gssapi => "GSSAPI",
            Self::Plain => "PLAIN",
            Self::ScramSha256 => "SCRAM-SHA-256",
            Self::ScramSha512 => "SCRAM-SHA-512",
            Self::OAuthBearer => "OAUTHBEARER",
        }
    }

    /// Whether the mechanism authenticates against a Kerberos service principal.
    #[must_use]
    pub fn requires_service_name(&self) -> bool {
        matches!(self, Self::Gssapi)
    }
}

/// SASL configuration shared by both modes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SaslConfig {
    /// Mechanism a client uses.
    #[serde(default)]
    pub mechanism: SaslMechanism,

    /// Mechanisms a server offers.
    #[serde(default = "default_enabled_mechanisms")]
    pub enabled_mechanisms: Vec<SaslMechanism>,

    /// Kerberos identity and principal mapping options.
    #[serde(default)]
    pub kerberos: KerberosConfig,
}

/// Kerberos login and principal mapping configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct KerberosConfig {
    /// Primary of the service principal Kafka runs as (e.g. `kafka`).
    pub service_name: Option<String>,

    /// Principal to log in as.
    /// Supports environment variable expansion: "${KAFKA_PRINCIPAL}"
    pub principal: Option<String>,

    /// Keytab holding the principal's keys.
    /// Supports environment variable expansion.
    pub keytab: Option<String>,

    /// Realm used by `DEFAULT` mapping rules. Read from the krb5
    /// configuration when unset.
    pub default_realm: Option<String>,

    /// Ordered `auth_to_local` rules. Absent means names pass through unchanged.
    pub principal_to_local_rules: Option<Vec<String>>,
}

impl KerberosConfig {
    /// Get the principal with environment variables expanded.
    #[must_use]
    pub fn principal(&self) -> Option<String> {
        self.principal
            .as_deref()
            .map(expand_env_vars)
            .filter(|p| !p.trim().is_empty())
    }

    /// Get the keytab path with environment variables expanded.
    #[must_use]
    pub fn keytab(&self) -> Option<PathBuf> {
        self.keytab
            .as_deref()
            .map(expand_env_vars)
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
    }

    /// Get the service name, ignoring blank values.
    #[must_use]
    pub fn service_name(&self) -> Option<&str> {
        self.service_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// TLS options for `SASL_SSL` channels.
///
/// In client mode the CA file is optional (webpki roots are used otherwise)
/// and a certificate/key pair enables mTLS. In server mode the certificate
/// and key are required.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SslConfig {
    /// Path to the certificate chain (PEM format).
    pub cert_path: Option<PathBuf>,

    /// Path to the private key (PEM format).
    pub key_path: Option<PathBuf>,

    /// Path to CA certificate file (PEM format) used to verify the peer.
    pub ca_cert_path: Option<PathBuf>,

    /// Whether a server requires clients to present certificates.
    #[serde(default)]
    pub require_client_cert: bool,
}

/// Listener options for the CLI accept loop.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenConfig {
    /// Address to bind to, e.g., "0.0.0.0:9093".
    #[serde(default = "default_listen_address")]
    pub address: String,

    /// Maximum size of a single received frame.
    #[serde(default = "default_max_receive_size")]
    pub max_receive_size: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output logs in JSON format (for production).
    #[serde(default)]
    pub json: bool,
}

impl LoggingConfig {
    /// Warnings and errors only, for one-shot commands.
    #[must_use]
    pub fn quiet() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

/// Expand environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of the environment variable `VAR_NAME`.
/// If the variable is not set, replaces with an empty string.
fn expand_env_vars(s: &str) -> String {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex");
    re.replace_all(s, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_default()
    })
    .to_string()
}

// Default value functions

fn default_enabled_mechanisms() -> Vec<SaslMechanism> {
    vec![SaslMechanism::Gssapi]
}

fn default_listen_address() -> String {
    "0.0.0.0:9093".to_string()
}

fn default_max_receive_size() -> usize {
    DEFAULT_MAX_RECEIVE_SIZE
}

fn default_log_level() -> String {
    "info".to_string()
}

// Default implementations

impl Default for SaslConfig {
    fn default() -> Self {
        Self {
            mechanism: SaslMechanism::default(),
            enabled_mechanisms: default_enabled_mechanisms(),
            kerberos: KerberosConfig::default(),
        }
    }
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            address: default_listen_address(),
            max_receive_size: default_max_receive_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Configuration loading and validation

impl ChannelConfig {
    /// Minimal configuration for the given protocol and mode.
    #[must_use]
    pub fn new(security_protocol: SecurityProtocol, mode: Mode) -> Self {
        Self {
            security_protocol,
            mode,
            sasl: SaslConfig::default(),
            ssl: None,
            listen: ListenConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if
    /// validation fails.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&content)
    }

    /// Load configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or validation fails.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> ConfigResult<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the protocol does not use SASL
    /// - a server offers no mechanisms
    /// - a `SASL_SSL` server has no certificate or key
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.security_protocol.requires_sasl() {
            return Err(ConfigError::UnsupportedProtocol(self.security_protocol));
        }

        if self.mode == Mode::Server && self.sasl.enabled_mechanisms.is_empty() {
            return Err(ConfigError::MissingOption("sasl.enabled_mechanisms"));
        }

        if self.security_protocol.requires_tls() && self.mode == Mode::Server {
            let ssl = self.ssl.as_ref().ok_or(ConfigError::MissingOption("ssl"))?;
            if ssl.cert_path.is_none() {
                return Err(ConfigError::MissingOption("ssl.cert_path"));
            }
            if ssl.key_path.is_none() {
                return Err(ConfigError::MissingOption("ssl.key_path"));
            }
        }

        Ok(())
    }

    /// Mechanisms the local endpoint will use or offer.
    #[must_use]
    pub fn mechanisms(&self) -> Vec<SaslMechanism> {
        match self.mode {
            Mode::Client => vec![self.sasl.mechanism],
            Mode::Server => self.sasl.enabled_mechanisms.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_passes_validation() {
        let config = ChannelConfig::new(SecurityProtocol::SaslPlaintext, Mode::Server);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_non_sasl_protocol_rejected() {
        let config = ChannelConfig::new(SecurityProtocol::Ssl, Mode::Client);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnsupportedProtocol(SecurityProtocol::Ssl))
        ));
    }

    #[test]
    fn test_server_without_mechanisms_rejected() {
        let mut config = ChannelConfig::new(SecurityProtocol::SaslPlaintext, Mode::Server);
        config.sasl.enabled_mechanisms.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingOption("sasl.enabled_mechanisms"))
        ));
    }

    #[test]
    fn test_ssl_server_requires_certificate() {
        let mut config = ChannelConfig::new(SecurityProtocol::SaslSsl, Mode::Server);
        assert!(matches!(config.validate(), Err(ConfigError::MissingOption("ssl"))));

        config.ssl = Some(SslConfig {
            key_path: Some(PathBuf::from("/etc/ssl/server.key")),
            ..Default::default()
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingOption("ssl.cert_path"))
        ));
    }

    #[test]
    fn test_ssl_client_needs_no_certificate() {
        let config = ChannelConfig::new(SecurityProtocol::SaslSsl, Mode::Client);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_yaml_string() {
        let yaml = r"
security_protocol: SASL_PLAINTEXT
mode: SERVER
sasl:
  enabled_mechanisms: [GSSAPI, SCRAM-SHA-256]
  kerberos:
    service_name: kafka
    principal: 'kafka/broker1.example.com@EXAMPLE.COM'
    principal_to_local_rules:
      - 'RULE:[2:$1@$0](kafka@EXAMPLE.COM)s/.*/kafka/'
      - DEFAULT
";
        let config = ChannelConfig::from_str(yaml).unwrap();
        assert_eq!(config.security_protocol, SecurityProtocol::SaslPlaintext);
        assert_eq!(config.mode, Mode::Server);
        assert_eq!(
            config.mechanisms(),
            vec![SaslMechanism::Gssapi, SaslMechanism::ScramSha256]
        );
        assert_eq!(config.sasl.kerberos.service_name(), Some("kafka"));
        assert_eq!(
            config.sasl.kerberos.principal_to_local_rules.as_ref().map(Vec::len),
            Some(2)
        );
    }

    #[test]
    fn test_default_values_applied() {
        let yaml = r"
security_protocol: SASL_SSL
mode: CLIENT
";
        let config = ChannelConfig::from_str(yaml).unwrap();
        assert_eq!(config.sasl.mechanism, SaslMechanism::Gssapi);
        assert_eq!(config.sasl.enabled_mechanisms, vec![SaslMechanism::Gssapi]);
        assert!(config.sasl.kerberos.principal_to_local_rules.is_none());
        assert!(config.ssl.is_none());
        assert_eq!(config.listen.max_receive_size, DEFAULT_MAX_RECEIVE_SIZE);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_ssl_options_parsing() {
        let yaml = r"
security_protocol: SASL_SSL
mode: SERVER
ssl:
  cert_path: '/etc/ssl/server.crt'
  key_path: '/etc/ssl/server.key'
  ca_cert_path: '/etc/ssl/ca.crt'
  require_client_cert: true
";
        let config = ChannelConfig::from_str(yaml).unwrap();
        let ssl = config.ssl.unwrap();
        assert_eq!(ssl.cert_path, Some(PathBuf::from("/etc/ssl/server.crt")));
        assert!(ssl.require_client_cert);
    }

    #[test]
    fn test_unknown_protocol_is_parse_error() {
        let yaml = r"
security_protocol: SASL_QUIC
mode: CLIENT
";
        assert!(matches!(
            ChannelConfig::from_str(yaml),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("TEST_KRB_PRINCIPAL", "client@EXAMPLE.COM");
        std::env::set_var("TEST_KRB_KEYTAB", "/etc/security/client.keytab");

        let config = KerberosConfig {
            principal: Some("${TEST_KRB_PRINCIPAL}".to_string()),
            keytab: Some("${TEST_KRB_KEYTAB}".to_string()),
            ..Default::default()
        };

        assert_eq!(config.principal().as_deref(), Some("client@EXAMPLE.COM"));
        assert_eq!(
            config.keytab(),
            Some(PathBuf::from("/etc/security/client.keytab"))
        );

        std::env::remove_var("TEST_KRB_PRINCIPAL");
        std::env::remove_var("TEST_KRB_KEYTAB");
    }

    #[test]
    fn test_env_var_expansion_missing_var() {
        let config = KerberosConfig {
            principal: Some("${NONEXISTENT_KRB_VAR}".to_string()),
            service_name: Some("  ".to_string()),
            ..Default::default()
        };

        assert_eq!(config.principal(), None);
        assert_eq!(config.service_name(), None);
    }

    #[test]
    fn test_security_protocol_methods() {
        assert!(!SecurityProtocol::Plaintext.requires_tls());
        assert!(!SecurityProtocol::Plaintext.requires_sasl());

        assert!(SecurityProtocol::SaslPlaintext.requires_sasl());
        assert!(!SecurityProtocol::SaslPlaintext.requires_tls());

        assert!(SecurityProtocol::SaslSsl.requires_tls());
        assert!(SecurityProtocol::SaslSsl.requires_sasl());
    }

    #[test]
    fn test_sasl_mechanism_names() {
        assert_eq!(SaslMechanism::Gssapi.mechanism_name(), "GSSAPI");
        assert_eq!(SaslMechanism::ScramSha512.mechanism_name(), "SCRAM-SHA-512");
        assert!(SaslMechanism::Gssapi.requires_service_name());
        assert!(!SaslMechanism::Plain.requires_service_name());
    }
}
