use std::sync::Arc;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

use crate::clock::Clock;
use crate::clock::SystemClock;
use crate::jwt::Claims;
use crate::jwt::JwtError;
use crate::jwt::JwtHandler;

/// A freshly signed bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies signed, time-limited session tokens.
///
/// Stateless: nothing about issued tokens is retained, so a token stays valid
/// until it expires or the signing secret changes.
pub struct TokenService {
    handler: JwtHandler,
    default_lifetime: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub const DEFAULT_LIFETIME_MINUTES: i64 = 30;

    pub fn new(handler: JwtHandler) -> Self {
        Self {
            handler,
            default_lifetime: Duration::minutes(Self::DEFAULT_LIFETIME_MINUTES),
            clock: Arc::new(SystemClock),
        }
    }

    /// Set the lifetime used when `issue` is called without one.
    ///
    /// # Errors
    /// * `InvalidLifetime` - Lifetime is zero or negative
    pub fn with_default_lifetime(mut self, lifetime: Duration) -> Result<Self, JwtError> {
        if lifetime <= Duration::zero() {
            return Err(JwtError::InvalidLifetime);
        }
        self.default_lifetime = lifetime;
        Ok(self)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn default_lifetime(&self) -> Duration {
        self.default_lifetime
    }

    /// Sign a token for `subject`.
    ///
    /// # Arguments
    /// * `subject` - Identity handle carried in the `sub` claim
    /// * `lifetime` - Validity period; the configured default when `None`
    ///
    /// # Errors
    /// * `InvalidLifetime` - Lifetime is zero or negative
    /// * `EncodingFailed` - Signing failed
    pub fn issue(&self, subject: &str, lifetime: Option<Duration>) -> Result<IssuedToken, JwtError> {
        let lifetime = lifetime.unwrap_or(self.default_lifetime);
        if lifetime <= Duration::zero() {
            return Err(JwtError::InvalidLifetime);
        }

        let issued_at = self.clock.now();
        let claims = Claims::for_subject(subject, issued_at, lifetime);
        let token = self.handler.encode(&claims)?;

        Ok(IssuedToken {
            token,
            expires_at: issued_at + lifetime,
        })
    }

    /// Verify a token and return its subject.
    ///
    /// # Errors
    /// * `TokenInvalid` - Bad signature, wrong algorithm or malformed token
    /// * `MissingClaim` - Token lacks `sub` or `exp`
    /// * `TokenExpired` - Expiry is in the past
    pub fn verify(&self, token: &str) -> Result<String, JwtError> {
        let claims: Claims = self.handler.decode(token)?;

        if claims.exp.is_none() {
            return Err(JwtError::MissingClaim("exp".to_string()));
        }
        if claims.is_expired(self.clock.now().timestamp()) {
            return Err(JwtError::TokenExpired);
        }

        claims
            .sub
            .ok_or_else(|| JwtError::MissingClaim("sub".to_string()))
    }
}
