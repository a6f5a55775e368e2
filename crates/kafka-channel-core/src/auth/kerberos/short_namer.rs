//! Maps Kerberos principals to local short names.

use std::fmt;

use super::{KerberosName, KerberosRule, ShortNameError};

/// Maps fully qualified Kerberos principals to local user names.
///
/// # Rule Processing
///
/// Rules are processed in order and the first rule that produces a name wins.
/// When rules were supplied and none applies, mapping fails with
/// `NoMatchingRule` rather than passing the principal through. A namer built
/// without a rule set is an identity mapping.
///
/// # Thread Safety
///
/// `KerberosShortNamer` is immutable after construction and is shared across
/// every server authenticator behind an `Arc`.
#[derive(Debug, Clone)]
pub struct KerberosShortNamer {
    default_realm: String,
    rules: Option<Vec<KerberosRule>>,
}

impl KerberosShortNamer {
    /// A namer that returns every principal unchanged.
    #[must_use]
    pub fn identity(default_realm: &str) -> Self {
        Self {
            default_realm: default_realm.to_string(),
            rules: None,
        }
    }

    /// Compile rule strings against a default realm.
    ///
    /// `None` or an empty list yields the identity mapping.
    ///
    /// # Examples
    ///
    /// ```
    /// use kafka_channel_core::auth::kerberos::KerberosShortNamer;
    ///
    /// let rules = vec![
    ///     "RULE:[2:$1@$0](kafka@EXAMPLE\\.COM)s/.*/kafka/".to_string(),
    ///     "DEFAULT".to_string(),
    /// ];
    /// let namer = KerberosShortNamer::from_unparsed_rules("EXAMPLE.COM", Some(&rules)).unwrap();
    /// assert_eq!(namer.short_name("kafka/broker1@EXAMPLE.COM").unwrap(), "kafka");
    /// assert_eq!(namer.short_name("bob@EXAMPLE.COM").unwrap(), "bob");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `InvalidRuleSyntax` for the first rule that fails to parse.
    pub fn from_unparsed_rules(
        default_realm: &str,
        rules: Option<&[String]>,
    ) -> Result<Self, ShortNameError> {
        let rules = match rules {
            Some(rules) if !rules.is_empty() => Some(
                rules
                    .iter()
                    .map(|rule| KerberosRule::parse(default_realm, rule))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            _ => None,
        };

        Ok(Self {
            default_realm: default_realm.to_string(),
            rules,
        })
    }

    /// Map a principal string to its short name.
    ///
    /// # Errors
    ///
    /// Returns `MalformedName` for unparsable principals and `NoMatchingRule`
    /// when no rule applies.
    pub fn short_name(&self, principal: &str) -> Result<String, ShortNameError> {
        if self.rules.is_none() {
            return Ok(principal.to_string());
        }
        self.short_name_of(&KerberosName::parse(principal)?)
    }

    /// Map an already parsed name to its short name.
    ///
    /// # Errors
    ///
    /// Returns `NoMatchingRule` when no rule applies, or the error of the
    /// first rule that fails while applying.
    pub fn short_name_of(&self, name: &KerberosName) -> Result<String, ShortNameError> {
        let Some(rules) = &self.rules else {
            return Ok(name.to_string());
        };

        let Some(realm) = name.realm() else {
            return Ok(name.service_name().to_string());
        };

        let mut params = vec![realm, name.service_name()];
        if let Some(host) = name.host_name() {
            params.push(host);
        }

        for rule in rules {
            if let Some(short) = rule.apply(&params)? {
                return Ok(short);
            }
        }

        Err(ShortNameError::NoMatchingRule(format!(
            "{name}, rules [{}]",
            rules
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }

    /// Realm used by `DEFAULT` rules.
    #[must_use]
    pub fn default_realm(&self) -> &str {
        &self.default_realm
    }

    /// Whether principals pass through unchanged.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.rules.is_none()
    }

    /// Get the number of compiled rules.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.as_ref().map_or(0, Vec::len)
    }
}

impl fmt::Display for KerberosShortNamer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KerberosShortNamer({} rules)", self.rule_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn namer(rules: &[&str]) -> KerberosShortNamer {
        let rules: Vec<String> = rules.iter().map(|r| (*r).to_string()).collect();
        KerberosShortNamer::from_unparsed_rules("EXAMPLE.COM", Some(&rules)).unwrap()
    }

    #[test]
    fn test_absent_rules_are_identity() {
        let namer = KerberosShortNamer::from_unparsed_rules("EXAMPLE.COM", None).unwrap();
        assert!(namer.is_identity());
        assert_eq!(
            namer.short_name("kafka/host@EXAMPLE.COM").unwrap(),
            "kafka/host@EXAMPLE.COM"
        );
    }

    #[test]
    fn test_empty_rules_are_identity() {
        let namer = KerberosShortNamer::from_unparsed_rules("EXAMPLE.COM", Some(&[])).unwrap();
        assert!(namer.is_identity());
        assert_eq!(namer.short_name("x@OTHER").unwrap(), "x@OTHER");
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let namer = namer(&["RULE:[1:$1]/U", "RULE:[1:$1]/L", "DEFAULT"]);
        assert_eq!(namer.short_name("alice@EXAMPLE.COM").unwrap(), "ALICE");
    }

    #[test]
    fn test_rules_skip_until_component_count_matches() {
        let namer = namer(&["RULE:[2:$1]", "RULE:[1:$1]/L"]);
        assert_eq!(namer.short_name("Alice@ANY.REALM").unwrap(), "alice");
        assert_eq!(namer.short_name("kafka/host@ANY.REALM").unwrap(), "kafka");
    }

    #[test]
    fn test_default_rule_only_strips_default_realm() {
        let namer = namer(&["DEFAULT"]);
        assert_eq!(namer.short_name("alice@EXAMPLE.COM").unwrap(), "alice");

        let result = namer.short_name("alice@OTHER.ORG");
        assert!(matches!(result, Err(ShortNameError::NoMatchingRule(_))));
    }

    #[test]
    fn test_no_matching_rule_names_principal() {
        let namer = namer(&["RULE:[2:$1]"]);
        match namer.short_name("alice@EXAMPLE.COM") {
            Err(ShortNameError::NoMatchingRule(msg)) => {
                assert!(msg.contains("alice@EXAMPLE.COM"));
                assert!(msg.contains("RULE:[2:$1]"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_bare_name_passes_through_rules() {
        let namer = namer(&["RULE:[2:$1]"]);
        assert_eq!(namer.short_name("alice").unwrap(), "alice");
    }

    #[test]
    fn test_malformed_principal() {
        let namer = namer(&["DEFAULT"]);
        let result = namer.short_name("a@b@c");
        assert!(matches!(result, Err(ShortNameError::MalformedName(_))));
    }

    #[test]
    fn test_invalid_rule_fails_compilation() {
        let rules = vec!["DEFAULT".to_string(), "RULE:[1:$1".to_string()];
        let result = KerberosShortNamer::from_unparsed_rules("EXAMPLE.COM", Some(&rules));
        match result {
            Err(ShortNameError::InvalidRuleSyntax { rule, .. }) => assert_eq!(rule, "RULE:[1:$1"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_empty_default_realm() {
        let rules = vec!["DEFAULT".to_string()];
        let namer = KerberosShortNamer::from_unparsed_rules("", Some(&rules)).unwrap();
        assert!(namer.short_name("alice@EXAMPLE.COM").is_err());
        assert_eq!(namer.default_realm(), "");
    }

    #[test]
    fn test_display() {
        let namer = namer(&["RULE:[1:$1]", "DEFAULT"]);
        assert_eq!(format!("{namer}"), "KerberosShortNamer(2 rules)");
    }

    #[test]
    fn test_real_world_broker_rules() {
        let namer = namer(&[
            "RULE:[2:$1@$0](kafka@EXAMPLE\\.COM)s/.*/kafka/",
            "RULE:[1:$1@$0](.*@PARTNER\\.ORG)s/@.*//L",
            "DEFAULT",
        ]);

        assert_eq!(namer.short_name("kafka/broker-1@EXAMPLE.COM").unwrap(), "kafka");
        assert_eq!(namer.short_name("Carol@PARTNER.ORG").unwrap(), "carol");
        assert_eq!(namer.short_name("dave@EXAMPLE.COM").unwrap(), "dave");
        assert!(namer.short_name("eve@ELSEWHERE.NET").is_err());
    }
}
