use chrono::DateTime;
use chrono::Utc;

use crate::credentials::Credential;
use crate::credentials::CredentialStore;
use crate::jwt::JwtError;
use crate::password::PasswordError;
use crate::token::TokenService;

/// Authentication coordinator combining password verification and token issuance.
pub struct Authenticator {
    credentials: CredentialStore,
    tokens: TokenService,
}

/// Result of successful authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationResult {
    /// Signed bearer token
    pub access_token: String,
    /// Always `bearer`
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
}

/// Authentication operation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthenticationError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Password error: {0}")]
    PasswordError(#[from] PasswordError),

    #[error("JWT error: {0}")]
    JwtError(#[from] JwtError),
}

impl Authenticator {
    pub const TOKEN_TYPE: &'static str = "bearer";

    /// Create a new authenticator.
    ///
    /// # Arguments
    /// * `credentials` - Password policy and hashing
    /// * `tokens` - Bearer token signing and verification
    pub fn new(credentials: CredentialStore, tokens: TokenService) -> Self {
        Self {
            credentials,
            tokens,
        }
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Verify a password and issue a token for `subject`.
    ///
    /// The credential's login counters are updated either way: a mismatch
    /// increments the failed-attempt counter, a match resets it and stamps the
    /// login time.
    ///
    /// # Arguments
    /// * `credential` - Stored credential of the account
    /// * `password` - Plaintext password to verify
    /// * `subject` - Identity handle to put in the token
    ///
    /// # Errors
    /// * `InvalidCredentials` - Password does not match
    /// * `JwtError` - Token generation failed
    pub fn login(
        &self,
        credential: &mut Credential,
        password: &str,
        subject: &str,
    ) -> Result<AuthenticationResult, AuthenticationError> {
        if !self.credentials.check_password(credential, password) {
            credential.record_failed_login();
            return Err(AuthenticationError::InvalidCredentials);
        }

        let issued = self.tokens.issue(subject, None)?;
        credential.record_successful_login(self.credentials.clock().now());

        Ok(AuthenticationResult {
            access_token: issued.token,
            token_type: Self::TOKEN_TYPE,
            expires_at: issued.expires_at,
        })
    }

    /// Validate a bearer token and return its subject.
    ///
    /// # Errors
    /// * `JwtError` - Token expired, invalid or missing claims
    pub fn validate_token(&self, token: &str) -> Result<String, JwtError> {
        self.tokens.verify(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::JwtHandler;
    use crate::password::HashParams;
    use crate::password::PasswordHasher;
    use crate::password::PasswordPolicy;

    fn authenticator() -> Authenticator {
        let hasher = PasswordHasher::with_params(HashParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap();
        Authenticator::new(
            CredentialStore::new(PasswordPolicy::new(), hasher),
            TokenService::new(JwtHandler::new(b"test_secret_key_at_least_32_bytes!")),
        )
    }

    #[test]
    fn test_login_success() {
        let authenticator = authenticator();
        let mut credential = authenticator
            .credentials()
            .new_credential("CorrectHorse9!Battery")
            .expect("Failed to hash password");
        credential.failed_login_attempts = 3;

        let result = authenticator
            .login(&mut credential, "CorrectHorse9!Battery", "alice")
            .expect("Authentication failed");

        assert_eq!(result.token_type, "bearer");
        assert_eq!(credential.failed_login_attempts, 0);
        assert!(credential.last_login_at.is_some());

        let subject = authenticator
            .validate_token(&result.access_token)
            .expect("Token validation failed");
        assert_eq!(subject, "alice");
    }

    #[test]
    fn test_login_invalid_password() {
        let authenticator = authenticator();
        let mut credential = authenticator
            .credentials()
            .new_credential("CorrectHorse9!Battery")
            .unwrap();

        let result = authenticator.login(&mut credential, "wrong_password", "alice");

        assert!(matches!(
            result,
            Err(AuthenticationError::InvalidCredentials)
        ));
        assert_eq!(credential.failed_login_attempts, 1);
        assert!(credential.last_login_at.is_none());
    }

    #[test]
    fn test_validate_invalid_token() {
        let authenticator = authenticator();

        let result = authenticator.validate_token("invalid.token.here");
        assert!(result.is_err());
    }
}
