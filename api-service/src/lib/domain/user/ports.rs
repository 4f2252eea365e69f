use async_trait::async_trait;
use auth::Credential;
use chrono::DateTime;
use chrono::Utc;

use crate::domain::user::models::AuthenticateCommand;
use crate::domain::user::models::AuthenticatedSession;
use crate::domain::user::models::ChangePasswordCommand;
use crate::domain::user::models::RegisterUserCommand;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::user::errors::UserError;
use crate::user::models::Username;

/// Port for user domain service operations.
#[async_trait]
pub trait UserServicePort: Send + Sync + 'static {
    /// Register a new account.
    ///
    /// # Arguments
    /// * `command` - Validated username and email plus the plaintext password
    ///
    /// # Returns
    /// Created user entity
    ///
    /// # Errors
    /// * `WeakPassword` - Password fails the policy
    /// * `UsernameAlreadyExists` - Username is already taken
    /// * `EmailAlreadyExists` - Email is already registered
    /// * `DatabaseError` - Database operation failed
    async fn register_user(&self, command: RegisterUserCommand) -> Result<User, UserError>;

    /// Verify a password and open a session.
    ///
    /// # Arguments
    /// * `command` - Username or email plus the plaintext password
    ///
    /// # Returns
    /// The user together with a freshly issued bearer token
    ///
    /// # Errors
    /// * `InvalidCredentials` - Unknown identifier, inactive account or wrong password
    /// * `DatabaseError` - Database operation failed
    async fn authenticate(
        &self,
        command: AuthenticateCommand,
    ) -> Result<AuthenticatedSession, UserError>;

    /// Retrieve user by unique username.
    ///
    /// # Errors
    /// * `NotFoundByUsername` - No user with this username
    /// * `DatabaseError` - Database operation failed
    async fn get_user_by_username(&self, username: &Username) -> Result<User, UserError>;

    /// Replace the password of an account after checking the current one.
    ///
    /// # Errors
    /// * `InvalidCredentials` - Current password does not match
    /// * `WeakPassword` - New password fails the policy
    /// * `NotFound` - User does not exist
    async fn change_password(
        &self,
        id: &UserId,
        command: ChangePasswordCommand,
    ) -> Result<User, UserError>;

    /// Mark an account inactive. Inactive accounts cannot log in and their
    /// outstanding tokens stop being accepted.
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    async fn deactivate_user(&self, id: &UserId) -> Result<User, UserError>;
}

/// Persistence operations for user aggregate.
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Persist new user to storage.
    ///
    /// # Errors
    /// * `UsernameAlreadyExists` - Username is already taken
    /// * `EmailAlreadyExists` - Email is already registered
    /// * `DatabaseError` - Database operation failed
    async fn create(&self, user: User) -> Result<User, UserError>;

    /// Retrieve user by identifier.
    ///
    /// # Returns
    /// Optional user entity (None if not found)
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError>;

    /// Retrieve user by username.
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, UserError>;

    /// Retrieve user by email address.
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserError>;

    /// Persist the bookkeeping of a successful login: reset the failed-login
    /// counter and stamp the login time.
    ///
    /// Applies only while the account is active and its stored hash is still
    /// `verified_hash`, so a login that raced a password change or a
    /// deactivation cannot complete.
    ///
    /// # Returns
    /// The updated user, or None if the guard did not hold
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn record_login_success(
        &self,
        id: &UserId,
        verified_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<User>, UserError>;

    /// Atomically increment the failed-login counter.
    ///
    /// # Returns
    /// The new counter value, or None if the user does not exist
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn record_login_failure(&self, id: &UserId) -> Result<Option<u32>, UserError>;

    /// Replace the password fields of `credential` if the stored hash is still
    /// `previous_hash`. Login counters and the active flag are left untouched.
    ///
    /// # Returns
    /// The updated user, or None if the stored hash changed meanwhile
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn replace_credential(
        &self,
        id: &UserId,
        previous_hash: &str,
        credential: &Credential,
        at: DateTime<Utc>,
    ) -> Result<Option<User>, UserError>;

    /// Mark the account inactive.
    ///
    /// # Returns
    /// The updated user, or None if the user does not exist
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn deactivate(&self, id: &UserId, at: DateTime<Utc>) -> Result<Option<User>, UserError>;
}
