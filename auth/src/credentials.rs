use std::fmt;
use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;

use crate::clock::Clock;
use crate::clock::SystemClock;
use crate::password::PasswordError;
use crate::password::PasswordHasher;
use crate::password::PasswordPolicy;
use crate::password::PolicyViolation;

/// Stored credential of a user account.
///
/// Holds only the one-way secret; the plaintext password is never kept.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub password_hash: String,
    pub password_changed_at: Option<DateTime<Utc>>,
    pub password_reset_token: Option<String>,
    pub password_reset_expires: Option<DateTime<Utc>>,
    pub failed_login_attempts: u32,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Rebuild a credential from persisted columns.
    pub fn from_hash(password_hash: String) -> Self {
        Self {
            password_hash,
            password_changed_at: None,
            password_reset_token: None,
            password_reset_expires: None,
            failed_login_attempts: 0,
            last_login_at: None,
        }
    }

    pub fn record_failed_login(&mut self) {
        self.failed_login_attempts = self.failed_login_attempts.saturating_add(1);
    }

    pub fn record_successful_login(&mut self, at: DateTime<Utc>) {
        self.failed_login_attempts = 0;
        self.last_login_at = Some(at);
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("password_hash", &"<redacted>")
            .field("password_changed_at", &self.password_changed_at)
            .field(
                "password_reset_token",
                &self.password_reset_token.as_ref().map(|_| "<redacted>"),
            )
            .field("password_reset_expires", &self.password_reset_expires)
            .field("failed_login_attempts", &self.failed_login_attempts)
            .field("last_login_at", &self.last_login_at)
            .finish()
    }
}

/// Policy-gated one-way password storage.
///
/// Hashing and verification are CPU-bound by design; async callers should run
/// them on a blocking thread.
#[derive(Clone)]
pub struct CredentialStore {
    policy: PasswordPolicy,
    hasher: PasswordHasher,
    clock: Arc<dyn Clock>,
}

impl CredentialStore {
    pub fn new(policy: PasswordPolicy, hasher: PasswordHasher) -> Self {
        Self {
            policy,
            hasher,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used for credential timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Check a password against the strength policy without hashing it.
    pub fn validate_password_strength(&self, password: &str) -> Result<(), PolicyViolation> {
        self.policy.validate(password)
    }

    /// Build the credential for a new account.
    ///
    /// # Errors
    /// * `WeakCredential` - Password fails the policy
    /// * `HashingFailed` - Hashing operation failed
    pub fn new_credential(&self, password: &str) -> Result<Credential, PasswordError> {
        let mut credential = Credential::from_hash(String::new());
        self.set_password(&mut credential, password)?;
        Ok(credential)
    }

    /// Replace the stored secret of `credential`.
    ///
    /// The credential is left untouched when the password fails the policy or
    /// hashing fails. On success the change is timestamped and any pending
    /// reset token is cleared.
    ///
    /// # Errors
    /// * `WeakCredential` - Password fails the policy
    /// * `HashingFailed` - Hashing operation failed
    pub fn set_password(
        &self,
        credential: &mut Credential,
        password: &str,
    ) -> Result<(), PasswordError> {
        self.policy.validate(password)?;

        let password_hash = self.hasher.hash(password)?;

        credential.password_hash = password_hash;
        credential.password_changed_at = Some(self.clock.now());
        credential.password_reset_token = None;
        credential.password_reset_expires = None;

        tracing::info!(event = "password_set", "Password hash replaced");

        Ok(())
    }

    /// Verify `password` against the stored secret.
    ///
    /// Never fails: empty input, an unrecognised secret format and internal
    /// verification errors all yield `false`.
    pub fn check_password(&self, credential: &Credential, password: &str) -> bool {
        if password.is_empty() || credential.password_hash.is_empty() {
            return false;
        }

        match self.hasher.verify(password, &credential.password_hash) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::error!(error = %e, "Password check error");
                false
            }
        }
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new(PasswordPolicy::new(), PasswordHasher::new())
    }
}
