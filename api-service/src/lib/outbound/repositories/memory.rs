use std::collections::HashMap;

use async_trait::async_trait;
use auth::Credential;
use chrono::DateTime;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::models::Username;
use crate::domain::user::ports::UserRepository;
use crate::user::errors::UserError;

/// Process-local user storage, used when no database is configured.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<UserId, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_unique(
        users: &HashMap<UserId, User>,
        candidate: &User,
    ) -> Result<(), UserError> {
        for existing in users.values().filter(|u| u.id != candidate.id) {
            if existing.username == candidate.username {
                return Err(UserError::UsernameAlreadyExists(
                    candidate.username.to_string(),
                ));
            }
            if existing.email.as_str().eq_ignore_ascii_case(candidate.email.as_str()) {
                return Err(UserError::EmailAlreadyExists(candidate.email.to_string()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: User) -> Result<User, UserError> {
        let mut users = self.users.write().await;
        Self::check_unique(&users, &user)?;
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, UserError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| &u.username == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email.as_str().eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn record_login_success(
        &self,
        id: &UserId,
        verified_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<User>, UserError> {
        let mut users = self.users.write().await;
        let Some(user) = users
            .get_mut(id)
            .filter(|u| u.is_active && u.credential.password_hash == verified_hash)
        else {
            return Ok(None);
        };
        user.credential.record_successful_login(at);
        Ok(Some(user.clone()))
    }

    async fn record_login_failure(&self, id: &UserId) -> Result<Option<u32>, UserError> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(id).map(|user| {
            user.credential.record_failed_login();
            user.credential.failed_login_attempts
        }))
    }

    async fn replace_credential(
        &self,
        id: &UserId,
        previous_hash: &str,
        credential: &Credential,
        at: DateTime<Utc>,
    ) -> Result<Option<User>, UserError> {
        let mut users = self.users.write().await;
        let Some(user) = users
            .get_mut(id)
            .filter(|u| u.credential.password_hash == previous_hash)
        else {
            return Ok(None);
        };
        let stored = &mut user.credential;
        stored.password_hash = credential.password_hash.clone();
        stored.password_changed_at = credential.password_changed_at;
        stored.password_reset_token = credential.password_reset_token.clone();
        stored.password_reset_expires = credential.password_reset_expires;
        user.updated_at = at;
        Ok(Some(user.clone()))
    }

    async fn deactivate(&self, id: &UserId, at: DateTime<Utc>) -> Result<Option<User>, UserError> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(id).map(|user| {
            user.is_active = false;
            user.updated_at = at;
            user.clone()
        }))
    }
}
