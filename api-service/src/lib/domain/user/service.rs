use std::sync::Arc;

use async_trait::async_trait;
use auth::AuthenticationError;
use auth::Authenticator;
use auth::Credential;
use chrono::Utc;

use crate::domain::audit::events::AuditEvent;
use crate::domain::audit::events::AuditEventKind;
use crate::domain::audit::ports::AuditSink;
use crate::domain::user::models::AuthenticateCommand;
use crate::domain::user::models::AuthenticatedSession;
use crate::domain::user::models::ChangePasswordCommand;
use crate::domain::user::models::RegisterUserCommand;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::models::Username;
use crate::user::errors::UserError;
use crate::user::ports::UserRepository;
use crate::user::ports::UserServicePort;

/// Domain service implementation for user operations.
///
/// Concrete implementation of UserServicePort with dependency injection.
/// Hashing and verification are CPU-bound and run on the blocking pool.
pub struct UserService<UR, AS>
where
    UR: UserRepository,
    AS: AuditSink,
{
    repository: Arc<UR>,
    audit: Arc<AS>,
    authenticator: Arc<Authenticator>,
}

impl<UR, AS> UserService<UR, AS>
where
    UR: UserRepository,
    AS: AuditSink,
{
    /// Create a new user service with injected dependencies.
    ///
    /// # Arguments
    /// * `repository` - User persistence implementation
    /// * `audit` - Audit trail destination
    /// * `authenticator` - Password policy, hashing and token issuance
    pub fn new(repository: Arc<UR>, audit: Arc<AS>, authenticator: Arc<Authenticator>) -> Self {
        Self {
            repository,
            audit,
            authenticator,
        }
    }

    async fn record(&self, kind: AuditEventKind) {
        let event = AuditEvent::new(kind);
        if let Err(e) = self.audit.record(&event).await {
            tracing::error!(
                "Failed to record {} audit event {}: {}",
                event.event_type(),
                event.event_id,
                e
            );
        }
    }

    async fn find_for_login(&self, identifier: &str) -> Result<Option<User>, UserError> {
        if identifier.contains('@') {
            return self.repository.find_by_email(identifier).await;
        }
        match Username::new(identifier.to_string()) {
            Ok(username) => self.repository.find_by_username(&username).await,
            Err(_) => Ok(None),
        }
    }

    async fn require_user(&self, id: &UserId) -> Result<User, UserError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(UserError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl<UR, AS> UserServicePort for UserService<UR, AS>
where
    UR: UserRepository,
    AS: AuditSink,
{
    async fn register_user(&self, command: RegisterUserCommand) -> Result<User, UserError> {
        // Policy check is cheap; reject before touching storage.
        self.authenticator
            .credentials()
            .validate_password_strength(&command.password)?;

        if self
            .repository
            .find_by_email(command.email.as_str())
            .await?
            .is_some()
        {
            return Err(UserError::EmailAlreadyExists(command.email.to_string()));
        }
        if self
            .repository
            .find_by_username(&command.username)
            .await?
            .is_some()
        {
            return Err(UserError::UsernameAlreadyExists(
                command.username.to_string(),
            ));
        }

        let authenticator = Arc::clone(&self.authenticator);
        let password = command.password;
        let credential =
            tokio::task::spawn_blocking(move || authenticator.credentials().new_credential(&password))
                .await??;

        let user = User::new(command.username, command.email, credential);
        let created_user = self.repository.create(user).await?;

        tracing::info!(
            user_id = %created_user.id,
            username = %created_user.username,
            "User registered"
        );

        Ok(created_user)
    }

    async fn authenticate(
        &self,
        command: AuthenticateCommand,
    ) -> Result<AuthenticatedSession, UserError> {
        let user = match self.find_for_login(&command.identifier).await? {
            Some(user) if user.is_active => user,
            _ => {
                self.record(AuditEventKind::LoginFailed {
                    identifier: command.identifier,
                    failed_attempts: None,
                })
                .await;
                return Err(UserError::InvalidCredentials);
            }
        };

        let authenticator = Arc::clone(&self.authenticator);
        let mut credential = user.credential.clone();
        let password = command.password;
        let subject = user.username.as_str().to_string();
        let outcome = tokio::task::spawn_blocking(move || {
            authenticator.login(&mut credential, &password, &subject)
        })
        .await?;

        match outcome {
            Ok(result) => {
                let login_at = self.authenticator.credentials().clock().now();
                let persisted = self
                    .repository
                    .record_login_success(&user.id, &user.credential.password_hash, login_at)
                    .await?;

                let Some(user) = persisted else {
                    tracing::warn!(
                        user_id = %user.id,
                        "Account changed while the login was verified, rejecting"
                    );
                    self.record(AuditEventKind::LoginFailed {
                        identifier: command.identifier,
                        failed_attempts: None,
                    })
                    .await;
                    return Err(UserError::InvalidCredentials);
                };

                self.record(AuditEventKind::LoginSucceeded {
                    user_id: user.id.to_string(),
                    username: user.username.to_string(),
                })
                .await;
                Ok(AuthenticatedSession {
                    user,
                    access_token: result.access_token,
                    token_type: result.token_type,
                    expires_at: result.expires_at,
                })
            }
            Err(AuthenticationError::InvalidCredentials) => {
                let failed_attempts = self.repository.record_login_failure(&user.id).await?;
                self.record(AuditEventKind::LoginFailed {
                    identifier: command.identifier,
                    failed_attempts,
                })
                .await;
                Err(UserError::InvalidCredentials)
            }
            Err(AuthenticationError::PasswordError(e)) => Err(e.into()),
            Err(AuthenticationError::JwtError(e)) => {
                Err(UserError::Unknown(format!("Token issuance failed: {}", e)))
            }
        }
    }

    async fn get_user_by_username(&self, username: &Username) -> Result<User, UserError> {
        self.repository
            .find_by_username(username)
            .await?
            .ok_or(UserError::NotFoundByUsername(username.to_string()))
    }

    async fn change_password(
        &self,
        id: &UserId,
        command: ChangePasswordCommand,
    ) -> Result<User, UserError> {
        let user = self.require_user(id).await?;
        let previous_hash = user.credential.password_hash.clone();

        let authenticator = Arc::clone(&self.authenticator);
        let credential = user.credential;
        let credential = tokio::task::spawn_blocking(move || -> Result<Credential, UserError> {
            let store = authenticator.credentials();
            if !store.check_password(&credential, &command.current_password) {
                return Err(UserError::InvalidCredentials);
            }
            let mut credential = credential;
            store.set_password(&mut credential, &command.new_password)?;
            Ok(credential)
        })
        .await??;

        // A concurrent change replaced the hash the current password was checked against.
        let updated_user = self
            .repository
            .replace_credential(id, &previous_hash, &credential, Utc::now())
            .await?
            .ok_or(UserError::InvalidCredentials)?;

        self.record(AuditEventKind::PasswordChanged {
            user_id: updated_user.id.to_string(),
        })
        .await;

        Ok(updated_user)
    }

    async fn deactivate_user(&self, id: &UserId) -> Result<User, UserError> {
        let user = self.require_user(id).await?;
        if !user.is_active {
            return Ok(user);
        }

        let updated_user = self
            .repository
            .deactivate(id, Utc::now())
            .await?
            .ok_or(UserError::NotFound(id.to_string()))?;

        self.record(AuditEventKind::UserDeactivated {
            user_id: updated_user.id.to_string(),
        })
        .await;

        Ok(updated_user)
    }
}
