//! Principal mapping driven from YAML configuration.

use std::io::Write;
use std::sync::Arc;

use kafka_channel_core::auth::login_manager::CredentialRegistry;
use kafka_channel_core::auth::ShortNameError;
use kafka_channel_core::config::ChannelConfig;
use kafka_channel_core::error::{ChannelError, ConfigError};
use kafka_channel_core::network::SaslChannelBuilder;
use kafka_channel_core::testing::{CountingLogin, MockSocket};
use parking_lot::Mutex;
use tempfile::NamedTempFile;

/// Serializes tests that point `KRB5_CONFIG` at a fixture.
static KRB5_ENV: Mutex<()> = parking_lot::const_mutex(());

const BROKER_CONFIG: &str = r"
security_protocol: SASL_PLAINTEXT
mode: SERVER
sasl:
  enabled_mechanisms: [GSSAPI, PLAIN]
  kerberos:
    service_name: kafka
    principal: 'kafka/broker1.example.com@EXAMPLE.COM'
    default_realm: EXAMPLE.COM
    principal_to_local_rules:
      - 'RULE:[2:$1@$0](kafka@EXAMPLE\.COM)s/.*/kafka/'
      - 'RULE:[1:$1@$0](.*@PARTNER\.ORG)s/@.*//L'
      - 'RULE:[2:$1@$0](svc@EXAMPLE\.COM)s/@.*//U'
      - DEFAULT
";

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn configured(config: ChannelConfig) -> SaslChannelBuilder {
    let registry = Arc::new(CredentialRegistry::new(Arc::new(CountingLogin::new())));
    let builder =
        SaslChannelBuilder::new(config.mode, config.security_protocol).with_registry(registry);
    builder.configure(config).unwrap();
    builder
}

#[test]
fn test_rules_from_config_file() {
    let file = config_file(BROKER_CONFIG);
    let builder = configured(ChannelConfig::from_file(file.path()).unwrap());
    let namer = builder.short_namer().unwrap();

    assert_eq!(namer.rule_count(), 4);
    assert_eq!(namer.short_name("kafka/broker3.example.com@EXAMPLE.COM").unwrap(), "kafka");
    assert_eq!(namer.short_name("Carol@PARTNER.ORG").unwrap(), "carol");
    assert_eq!(namer.short_name("svc/ingest@EXAMPLE.COM").unwrap(), "SVC");
    assert_eq!(namer.short_name("dave@EXAMPLE.COM").unwrap(), "dave");
    assert!(matches!(
        namer.short_name("eve@ELSEWHERE.NET"),
        Err(ShortNameError::NoMatchingRule(_))
    ));
}

#[test]
fn test_channels_share_the_namer() {
    let builder = configured(ChannelConfig::from_str(BROKER_CONFIG).unwrap());

    let first = builder
        .build_channel("conn-1", MockSocket::new("10.0.0.1:40001".parse().unwrap()), 1024)
        .unwrap();
    let second = builder
        .build_channel("conn-2", MockSocket::new("10.0.0.2:40002".parse().unwrap()), 1024)
        .unwrap();

    let a = first.authenticator().as_server().unwrap().short_namer().unwrap();
    let b = second.authenticator().as_server().unwrap().short_namer().unwrap();
    assert!(Arc::ptr_eq(a, b));
}

#[test]
fn test_empty_rule_list_is_identity() {
    let yaml = r"
security_protocol: SASL_PLAINTEXT
mode: SERVER
sasl:
  kerberos:
    service_name: kafka
    principal: 'kafka/broker1.example.com@EXAMPLE.COM'
    principal_to_local_rules: []
";
    let builder = configured(ChannelConfig::from_str(yaml).unwrap());
    assert!(builder.short_namer().is_none());

    let channel = builder
        .build_channel("conn-1", MockSocket::new("10.0.0.1:40001".parse().unwrap()), 1024)
        .unwrap();
    let principal = channel
        .authenticator()
        .as_server()
        .unwrap()
        .map_principal("anyone/host@ANY.REALM")
        .unwrap();
    assert_eq!(principal.name, "anyone/host@ANY.REALM");
}

#[test]
fn test_bad_rule_rejected_at_configure() {
    let yaml = r"
security_protocol: SASL_PLAINTEXT
mode: SERVER
sasl:
  kerberos:
    service_name: kafka
    principal: 'kafka/broker1.example.com@EXAMPLE.COM'
    principal_to_local_rules:
      - DEFAULT
      - 'RULE:[1:$1](unclosed'
";
    let config = ChannelConfig::from_str(yaml).unwrap();
    let registry = Arc::new(CredentialRegistry::new(Arc::new(CountingLogin::new())));
    let builder = SaslChannelBuilder::new(config.mode, config.security_protocol)
        .with_registry(Arc::clone(&registry));

    let err = builder.configure(config).unwrap_err();
    match err {
        ChannelError::Configuration(ConfigError::InvalidRules(ShortNameError::InvalidRuleSyntax {
            rule,
            ..
        })) => assert_eq!(rule, "RULE:[1:$1](unclosed"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(registry.is_empty());
}

/// Configure a server with `DEFAULT` as its only rule and the given krb5
/// configuration in effect.
fn configured_with_krb5(principal: &str, krb5_conf: &str) -> SaslChannelBuilder {
    let _env = KRB5_ENV.lock();
    let krb5 = config_file(krb5_conf);
    std::env::set_var("KRB5_CONFIG", krb5.path());

    let yaml = format!(
        r"
security_protocol: SASL_PLAINTEXT
mode: SERVER
sasl:
  kerberos:
    service_name: kafka
    principal: '{principal}'
    principal_to_local_rules: [DEFAULT]
"
    );
    let builder = configured(ChannelConfig::from_str(&yaml).unwrap());
    std::env::remove_var("KRB5_CONFIG");
    builder
}

#[test]
fn test_default_rule_uses_krb5_realm_not_login_realm() {
    let builder = configured_with_krb5(
        "kafka/broker1@CORP.ORG",
        "[libdefaults]\n  default_realm = USERS.ORG\n",
    );
    let namer = builder.short_namer().unwrap();

    assert_eq!(namer.default_realm(), "USERS.ORG");
    assert_eq!(namer.short_name("alice@USERS.ORG").unwrap(), "alice");
    assert!(matches!(
        namer.short_name("alice@CORP.ORG"),
        Err(ShortNameError::NoMatchingRule(_))
    ));
}

#[test]
fn test_unknown_realm_configures_with_empty_realm() {
    let builder = configured_with_krb5("kafka", "");
    assert!(builder.is_configured());

    let namer = builder.short_namer().unwrap();
    assert_eq!(namer.default_realm(), "");
    assert!(matches!(
        namer.short_name("alice@X"),
        Err(ShortNameError::NoMatchingRule(_))
    ));
    assert_eq!(namer.short_name("alice").unwrap(), "alice");
}
