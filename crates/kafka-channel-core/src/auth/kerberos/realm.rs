//! Default realm resolution.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::KerberosConfig;

const DEFAULT_KRB5_CONF: &str = "/etc/krb5.conf";

/// Resolve the realm used by `DEFAULT` mapping rules.
///
/// Uses the configured `default_realm` if set, otherwise `default_realm` from
/// the krb5 configuration (`KRB5_CONFIG` or `/etc/krb5.conf`). The realm of
/// the login principal is not consulted. Returns `None` when neither yields
/// a realm.
#[must_use]
pub fn resolve_default_realm(config: &KerberosConfig) -> Option<String> {
    resolve_with_krb5_paths(config, &krb5_conf_paths())
}

fn resolve_with_krb5_paths(config: &KerberosConfig, paths: &[PathBuf]) -> Option<String> {
    if let Some(realm) = config.default_realm.as_deref().map(str::trim) {
        if !realm.is_empty() {
            return Some(realm.to_string());
        }
    }

    paths.iter().find_map(|path| match default_realm_from_krb5_conf(path) {
        Ok(realm) => realm,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "could not read krb5 configuration");
            None
        }
    })
}

fn krb5_conf_paths() -> Vec<PathBuf> {
    match std::env::var("KRB5_CONFIG") {
        Ok(paths) if !paths.trim().is_empty() => {
            std::env::split_paths(&paths).collect()
        }
        _ => vec![PathBuf::from(DEFAULT_KRB5_CONF)],
    }
}

/// Read `default_realm` from the `[libdefaults]` section of a krb5 config file.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn default_realm_from_krb5_conf(path: &Path) -> io::Result<Option<String>> {
    let contents = std::fs::read_to_string(path)?;
    let mut in_libdefaults = false;

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if line.starts_with('[') {
            in_libdefaults = line.eq_ignore_ascii_case("[libdefaults]");
            continue;
        }

        if !in_libdefaults {
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            if key.trim() == "default_realm" {
                let value = value.trim();
                return Ok((!value.is_empty()).then(|| value.to_string()));
            }
        }
    }

    Ok(None)
}
