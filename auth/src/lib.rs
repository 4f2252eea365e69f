//! Authentication utilities library
//!
//! Provides the credential and session-token core used by the API service:
//! - Password policy and one-way hashing (Argon2id)
//! - Credential records with login bookkeeping
//! - Signed, time-limited bearer tokens
//! - Authentication coordination
//!
//! # Examples
//!
//! ## Password Policy and Hashing
//! ```
//! use auth::CredentialStore;
//!
//! let store = CredentialStore::default();
//! assert!(store.validate_password_strength("Weak1!").is_err());
//!
//! let credential = store.new_credential("CorrectHorse9!Battery").unwrap();
//! assert!(store.check_password(&credential, "CorrectHorse9!Battery"));
//! ```
//!
//! ## Bearer Tokens
//! ```
//! use auth::{JwtHandler, TokenService};
//!
//! let tokens = TokenService::new(JwtHandler::new(b"secret_key_at_least_32_bytes_long!"));
//! let issued = tokens.issue("alice", None).unwrap();
//! assert_eq!(tokens.verify(&issued.token).unwrap(), "alice");
//! ```
//!
//! ## Complete Authentication Flow
//! ```
//! use auth::{Authenticator, CredentialStore, JwtHandler, TokenService};
//!
//! let auth = Authenticator::new(
//!     CredentialStore::default(),
//!     TokenService::new(JwtHandler::new(b"secret_key_at_least_32_bytes_long!")),
//! );
//!
//! // Register: validate and hash password
//! let mut credential = auth.credentials().new_credential("CorrectHorse9!Battery").unwrap();
//!
//! // Login: verify and generate token
//! let result = auth.login(&mut credential, "CorrectHorse9!Battery", "alice").unwrap();
//!
//! // Validate token
//! assert_eq!(auth.validate_token(&result.access_token).unwrap(), "alice");
//! ```

pub mod authenticator;
pub mod clock;
pub mod credentials;
pub mod jwt;
pub mod password;
pub mod token;

// Re-export commonly used items
pub use authenticator::AuthenticationError;
pub use authenticator::AuthenticationResult;
pub use authenticator::Authenticator;
pub use clock::Clock;
pub use clock::ManualClock;
pub use clock::SystemClock;
pub use credentials::Credential;
pub use credentials::CredentialStore;
pub use jwt::Claims;
pub use jwt::JwtError;
pub use jwt::JwtHandler;
pub use password::HashParams;
pub use password::PasswordError;
pub use password::PasswordHasher;
pub use password::PasswordPolicy;
pub use password::PolicyViolation;
pub use token::IssuedToken;
pub use token::TokenService;
