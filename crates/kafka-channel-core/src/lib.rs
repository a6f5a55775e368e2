//! Kafka SASL Channel Core Library
//!
//! This library decides, for every accepted or initiated socket, which
//! transport (plaintext or TLS) and which SASL authenticator (client or
//! server) to attach, and hands back a [`KafkaChannel`] the event loop can
//! read and write without knowing those details.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Domain-specific error types
//! - [`auth`] - Shared logins, Kerberos principal mapping, SASL authenticators
//! - [`tls`] - TLS session factory backed by `rustls`
//! - [`network`] - Transport selection and the channel builder
//!
//! # Example
//!
//! ```rust,ignore
//! use kafka_channel_core::config::ChannelConfig;
//! use kafka_channel_core::network::SaslChannelBuilder;
//!
//! let config = ChannelConfig::from_file("channel.yaml")?;
//! let builder = SaslChannelBuilder::new(config.mode, config.security_protocol);
//! builder.configure(config)?;
//!
//! for stream in listener.incoming() {
//!     let channel = builder.build_channel("conn-1", stream?, 100 * 1024 * 1024)?;
//!     // hand the channel to the event loop
//! }
//!
//! builder.close();
//! ```

#![forbid(unsafe_code)]

pub mod auth;
pub mod config;
pub mod error;
pub mod network;
pub mod tls;

/// Test utilities for builder and integration tests.
///
/// This module is only available when compiling tests or when the `testing` feature is enabled.
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use auth::{KerberosShortNamer, LoginManager, SaslAuthenticator};
pub use config::{ChannelConfig, Mode, SaslMechanism, SecurityProtocol};
pub use error::{ChannelError, ConfigError, Result};
pub use network::{KafkaChannel, RawSocket, SaslChannelBuilder, TransportLayer};
