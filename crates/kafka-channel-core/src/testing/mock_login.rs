//! Login provider that counts calls instead of talking to a KDC.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::auth::login_manager::{CredentialKey, Login, Subject};
use crate::error::CredentialError;

/// Principal given to subjects whose key has none.
pub const DEFAULT_TEST_PRINCIPAL: &str = "kafka/localhost@EXAMPLE.COM";

/// A [`Login`] that succeeds for any key, or always fails.
#[derive(Debug, Default)]
pub struct CountingLogin {
    failure: Option<String>,
    logins: AtomicUsize,
    logouts: AtomicUsize,
}

impl CountingLogin {
    /// A login that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A login that always fails with `reason`.
    #[must_use]
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Number of successful logins.
    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    /// Number of logouts.
    pub fn logouts(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }
}

impl Login for CountingLogin {
    fn login(&self, key: &CredentialKey) -> Result<Subject, CredentialError> {
        if let Some(reason) = &self.failure {
            return Err(CredentialError::Unavailable {
                mode: key.mode,
                reason: reason.clone(),
            });
        }

        self.logins.fetch_add(1, Ordering::SeqCst);
        Ok(Subject::new(
            key.mode,
            key.principal
                .clone()
                .unwrap_or_else(|| DEFAULT_TEST_PRINCIPAL.to_string()),
            Some(key.service_name.clone().unwrap_or_else(|| "kafka".to_string())),
            key.keytab.clone(),
        ))
    }

    fn logout(&self, _subject: &Subject) {
        self.logouts.fetch_add(1, Ordering::SeqCst);
    }
}
