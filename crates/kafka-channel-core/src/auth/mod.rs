//! Authentication collaborators of the channel builder.
//!
//! - [`login_manager`] - shared, reference-counted login state
//! - [`kerberos`] - `auth_to_local` principal mapping
//! - [`sasl`] - client and server authenticators
//! - [`principal`] - authenticated identities
//!
//! # Example Configuration
//!
//! ```yaml
//! security_protocol: SASL_SSL
//! mode: SERVER
//! sasl:
//!   enabled_mechanisms: [GSSAPI]
//!   kerberos:
//!     service_name: kafka
//!     principal: "kafka/broker1.example.com@EXAMPLE.COM"
//!     keytab: "${KAFKA_KEYTAB}"
//!     principal_to_local_rules:
//!       - "RULE:[2:$1@$0](kafka@EXAMPLE\\.COM)s/.*/kafka/"
//!       - "DEFAULT"
//! ssl:
//!   cert_path: "/etc/ssl/broker.crt"
//!   key_path: "/etc/ssl/broker.key"
//! ```

pub mod kerberos;
pub mod login_manager;
pub mod principal;
pub mod sasl;

pub use kerberos::{KerberosName, KerberosShortNamer, ShortNameError};
pub use login_manager::{
    CredentialKey, CredentialRegistry, KeytabLogin, Login, LoginManager, Subject,
};
pub use principal::{AuthMethod, Principal};
pub use sasl::{SaslAuthenticator, SaslClientAuthenticator, SaslServerAuthenticator};
