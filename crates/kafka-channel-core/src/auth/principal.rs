//! Principal representation for authenticated identities.
//!
//! This module provides types for representing authenticated principals,
//! following Apache Kafka's `KafkaPrincipal` design pattern.
//!
//! # Example
//!
//! ```
//! use kafka_channel_core::auth::{AuthMethod, Principal};
//!
//! let principal = Principal::new("alice", AuthMethod::Sasl);
//! assert_eq!(principal.to_string(), "User:alice");
//!
//! let anon = Principal::anonymous();
//! assert!(anon.is_anonymous());
//! ```

use std::fmt;

/// Type of principal - matches Kafka's `KafkaPrincipal.USER_TYPE`.
pub const USER_TYPE: &str = "User";

/// Represents an authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal {
    /// The type of principal (usually "User").
    pub principal_type: String,
    /// The local name of the principal.
    pub name: String,
    /// How this principal was authenticated.
    pub auth_method: AuthMethod,
}

/// How the principal was authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMethod {
    /// Not yet authenticated.
    Anonymous,
    /// SASL over a plaintext transport.
    Sasl,
    /// SASL over a TLS transport.
    SaslSsl,
}

impl AuthMethod {
    /// The SASL method for a transport.
    #[must_use]
    pub fn for_transport(encrypted: bool) -> Self {
        if encrypted {
            Self::SaslSsl
        } else {
            Self::Sasl
        }
    }
}

impl Principal {
    /// Create a new principal with the given name and authentication method.
    pub fn new(name: impl Into<String>, auth_method: AuthMethod) -> Self {
        Self {
            principal_type: USER_TYPE.to_string(),
            name: name.into(),
            auth_method,
        }
    }

    /// Create an anonymous principal for connections that have not authenticated.
    pub fn anonymous() -> Self {
        Self {
            principal_type: USER_TYPE.to_string(),
            name: "ANONYMOUS".to_string(),
            auth_method: AuthMethod::Anonymous,
        }
    }

    /// Check if this is an anonymous principal.
    pub fn is_anonymous(&self) -> bool {
        self.name == "ANONYMOUS" && matches!(self.auth_method, AuthMethod::Anonymous)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.principal_type, self.name)
    }
}

impl Default for Principal {
    fn default() -> Self {
        Self::anonymous()
    }
}
