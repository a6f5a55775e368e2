//! Domain error types for SASL channel construction.
//!
//! Uses `thiserror` for ergonomic error definitions with proper context.
//! [`ChannelError`] is the single surface returned by the channel builder;
//! the narrower enums describe failures of the individual collaborators and
//! are carried as its sources.

use thiserror::Error;

use crate::auth::kerberos::ShortNameError;
use crate::config::{Mode, SecurityProtocol};

/// Errors related to configuration parsing and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// The builder only handles SASL protocols.
    #[error("security protocol {0:?} is not handled by the SASL channel builder")]
    UnsupportedProtocol(SecurityProtocol),

    /// Configured mode does not match the builder's mode.
    #[error("configuration is for {configured:?} mode but builder runs in {builder:?} mode")]
    ModeMismatch { configured: Mode, builder: Mode },

    /// Configured protocol does not match the builder's protocol.
    #[error("configuration is for {configured:?} but builder serves {builder:?}")]
    ProtocolMismatch {
        configured: SecurityProtocol,
        builder: SecurityProtocol,
    },

    /// A required option is absent.
    #[error("missing required option: {0}")]
    MissingOption(&'static str),

    /// Principal-to-local rules failed to compile.
    #[error("invalid principal mapping rules: {0}")]
    InvalidRules(#[from] ShortNameError),

    /// The TLS session factory could not be initialised.
    #[error("failed to initialise TLS factory: {0}")]
    Tls(#[from] TlsError),

    /// `configure` was called on a builder that already left `Unconfigured`.
    #[error("channel builder is already configured")]
    AlreadyConfigured,
}

/// Errors from acquiring shared login state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// The configuration lacks identity material for the role.
    #[error("credentials unavailable for {mode:?} login: {reason}")]
    Unavailable { mode: Mode, reason: String },
}

/// Errors from TLS configuration and certificate loading.
#[derive(Error, Debug)]
pub enum TlsError {
    /// Invalid TLS configuration.
    #[error("TLS configuration error: {0}")]
    Config(String),

    /// Certificate file could not be read.
    #[error("failed to load certificate from '{path}': {message}")]
    CertificateLoad { path: String, message: String },

    /// Private key file could not be read.
    #[error("failed to load private key from '{path}': {message}")]
    PrivateKeyLoad { path: String, message: String },

    /// No certificates found in the file.
    #[error("no certificates found in '{0}'")]
    NoCertificates(String),

    /// No private key found in the file.
    #[error("no private key found in '{0}'")]
    NoPrivateKeys(String),
}

/// Errors from selecting and wrapping a connection's transport.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Encrypted transport requested without an initialised session factory.
    #[error("TLS session factory is not configured")]
    FactoryNotConfigured,

    /// Peer address of the raw socket could not be determined.
    #[error("failed to resolve peer address: {0}")]
    PeerResolution(#[source] std::io::Error),

    /// The session factory refused to create a session.
    #[error("failed to create TLS session for {peer_host}:{peer_port}: {message}")]
    Session {
        peer_host: String,
        peer_port: u16,
        message: String,
    },
}

/// Errors raised while creating or configuring an authenticator.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Peer hostname could not be read from the raw socket.
    #[error("failed to resolve peer host: {0}")]
    PeerResolution(#[source] std::io::Error),

    /// The requested mechanism is not supported.
    #[error("unsupported SASL mechanism: {0}")]
    UnsupportedMechanism(String),

    /// Server has no mechanisms to offer.
    #[error("no SASL mechanisms enabled")]
    NoMechanisms,

    /// GSSAPI needs a Kerberos service name.
    #[error("GSSAPI requires a Kerberos service name")]
    MissingServiceName,

    /// The shared login has already been torn down.
    #[error("login for principal '{0}' has been released")]
    CredentialReleased(String),

    /// The authenticated principal could not be mapped to a local name.
    #[error("failed to map principal: {0}")]
    Mapping(#[from] ShortNameError),
}

/// Errors reported by the channel builder.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Bad or missing options, detected at configure time.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Identity material could not be obtained.
    #[error(transparent)]
    CredentialUnavailable(#[from] CredentialError),

    /// Peer resolution or TLS session creation failed.
    #[error("transport setup failed: {0}")]
    TransportSetupFailed(#[from] TransportError),

    /// The handshake driver rejected its setup.
    #[error("authenticator initialisation failed: {0}")]
    AuthenticatorInitFailed(#[from] AuthError),

    /// Operation attempted after `close`.
    #[error("channel builder is closed")]
    BuilderClosed,

    /// Operation attempted before `configure`.
    #[error("channel builder is not configured")]
    NotConfigured,

    /// Per-connection construction failure, wrapping its cause.
    #[error("failed to create channel '{id}': {source}")]
    ChannelConstructionFailed {
        id: String,
        #[source]
        source: Box<ChannelError>,
    },
}

impl ChannelError {
    /// Wrap a per-connection failure.
    pub(crate) fn construction(id: &str, cause: impl Into<ChannelError>) -> Self {
        Self::ChannelConstructionFailed {
            id: id.to_string(),
            source: Box::new(cause.into()),
        }
    }

    /// The innermost error, looking through construction wrappers.
    #[must_use]
    pub fn root_cause(&self) -> &ChannelError {
        match self {
            Self::ChannelConstructionFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result type alias for channel builder operations.
pub type Result<T> = std::result::Result<T, ChannelError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for TLS setup.
pub type TlsResult<T> = std::result::Result<T, TlsError>;
