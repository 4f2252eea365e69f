use thiserror::Error;

use super::policy::PolicyViolation;

/// Error type for password operations.
#[derive(Debug, Clone, Error)]
pub enum PasswordError {
    #[error("Weak password: {0}")]
    WeakCredential(#[from] PolicyViolation),

    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    #[error("Password verification failed: {0}")]
    VerificationFailed(String),
}
