//! Kerberos principal names and `auth_to_local` short-name mapping.
//!
//! A server maps every principal it authenticates to a local user name
//! before building the session's [`Principal`](crate::auth::Principal). The
//! mapping follows Kafka's `sasl.kerberos.principal.to.local.rules`, which in
//! turn follows the Hadoop/MIT `auth_to_local` rule syntax.
//!
//! # Example
//!
//! ```
//! use kafka_channel_core::auth::kerberos::KerberosShortNamer;
//!
//! let rules = vec!["RULE:[1:$1]/L".to_string(), "DEFAULT".to_string()];
//! let namer = KerberosShortNamer::from_unparsed_rules("EXAMPLE.COM", Some(&rules)).unwrap();
//! assert_eq!(namer.short_name("Alice@OTHER.ORG").unwrap(), "alice");
//! ```

mod realm;
mod rule;
mod short_namer;

pub use realm::{default_realm_from_krb5_conf, resolve_default_realm};
pub use rule::KerberosRule;
pub use short_namer::KerberosShortNamer;

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// `service[/host]@REALM`
fn name_parser() -> &'static Regex {
    static PARSER: OnceLock<Regex> = OnceLock::new();
    PARSER.get_or_init(|| Regex::new(r"^([^/@]*)(/([^/@]*))?@([^/@]*)$").expect("valid regex"))
}

/// A parsed Kerberos principal name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KerberosName {
    service_name: String,
    host_name: Option<String>,
    realm: Option<String>,
}

impl KerberosName {
    /// Create a name from its components.
    pub fn new(
        service_name: impl Into<String>,
        host_name: Option<String>,
        realm: Option<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            host_name,
            realm,
        }
    }

    /// Parse `service[/host]@REALM`.
    ///
    /// A name without `@` is taken as a bare service name with no realm.
    ///
    /// # Errors
    ///
    /// Returns `MalformedName` if the name contains `@` but does not have the
    /// expected shape.
    pub fn parse(principal: &str) -> Result<Self, ShortNameError> {
        match name_parser().captures(principal) {
            Some(caps) => Ok(Self {
                service_name: caps[1].to_string(),
                host_name: caps.get(3).map(|m| m.as_str().to_string()),
                realm: Some(caps[4].to_string()),
            }),
            None if principal.contains('@') => {
                Err(ShortNameError::MalformedName(principal.to_string()))
            }
            None => Ok(Self::new(principal, None, None)),
        }
    }

    /// The first component of the name.
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// The second component, if the name has one.
    #[must_use]
    pub fn host_name(&self) -> Option<&str> {
        self.host_name.as_deref()
    }

    /// The realm, if the name has one.
    #[must_use]
    pub fn realm(&self) -> Option<&str> {
        self.realm.as_deref()
    }
}

impl fmt::Display for KerberosName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.service_name)?;
        if let Some(host) = &self.host_name {
            write!(f, "/{host}")?;
        }
        if let Some(realm) = &self.realm {
            write!(f, "@{realm}")?;
        }
        Ok(())
    }
}

/// Errors from compiling or applying principal mapping rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShortNameError {
    /// A rule string could not be parsed.
    #[error("invalid rule `{rule}`: {reason}")]
    InvalidRuleSyntax { rule: String, reason: String },
    /// No rule produced a name.
    #[error("no rules apply to {0}")]
    NoMatchingRule(String),
    /// The principal is not a valid Kerberos name.
    #[error("malformed Kerberos name: {0}")]
    MalformedName(String),
    /// A rule format referenced a component that does not exist.
    #[error("bad format in username mapping: {0}")]
    BadFormatString(String),
    /// A rule produced a name that still contains `/` or `@`.
    #[error("non-simple name {name} after auth_to_local rule {rule}")]
    NonSimpleName { name: String, rule: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_principal() {
        let name = KerberosName::parse("alice@EXAMPLE.COM").unwrap();
        assert_eq!(name.service_name(), "alice");
        assert_eq!(name.host_name(), None);
        assert_eq!(name.realm(), Some("EXAMPLE.COM"));
    }

    #[test]
    fn test_parse_service_principal() {
        let name = KerberosName::parse("kafka/broker1.example.com@EXAMPLE.COM").unwrap();
        assert_eq!(name.service_name(), "kafka");
        assert_eq!(name.host_name(), Some("broker1.example.com"));
        assert_eq!(name.realm(), Some("EXAMPLE.COM"));
        assert_eq!(name.to_string(), "kafka/broker1.example.com@EXAMPLE.COM");
    }

    #[test]
    fn test_parse_bare_name() {
        let name = KerberosName::parse("alice").unwrap();
        assert_eq!(name.service_name(), "alice");
        assert_eq!(name.realm(), None);
        assert_eq!(name.to_string(), "alice");
    }

    #[test]
    fn test_parse_malformed_name() {
        let result = KerberosName::parse("a@b@C");
        assert!(matches!(result, Err(ShortNameError::MalformedName(_))));

        let result = KerberosName::parse("a/b/c@REALM");
        assert!(matches!(result, Err(ShortNameError::MalformedName(_))));
    }
}
