use async_trait::async_trait;
use auth::Credential;
use chrono::DateTime;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::registry::EntityRegistry;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::models::Username;
use crate::domain::user::ports::UserRepository;
use crate::outbound::repositories::schema::EntityDefinition;
use crate::user::errors::UserError;

const USER_COLUMNS: &str = "id, username, email, password_hash, is_active, created_at, \
     updated_at, password_changed_at, password_reset_token, password_reset_expires, \
     failed_login_attempts, last_login_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    password_changed_at: Option<DateTime<Utc>>,
    password_reset_token: Option<String>,
    password_reset_expires: Option<DateTime<Utc>>,
    failed_login_attempts: i32,
    last_login_at: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for User {
    type Error = UserError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: UserId(row.id),
            username: Username::new(row.username)?,
            email: EmailAddress::new(row.email)?,
            credential: Credential {
                password_hash: row.password_hash,
                password_changed_at: row.password_changed_at,
                password_reset_token: row.password_reset_token,
                password_reset_expires: row.password_reset_expires,
                failed_login_attempts: row.failed_login_attempts.max(0) as u32,
                last_login_at: row.last_login_at,
            },
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the tables of every registered entity that does not exist yet.
    pub async fn ensure_schema(
        &self,
        registry: &EntityRegistry<EntityDefinition>,
    ) -> Result<(), UserError> {
        for definition in registry.definitions() {
            sqlx::query(&definition.create_table_sql())
                .execute(&self.pool)
                .await
                .map_err(|e| UserError::DatabaseError(e.to_string()))?;
            tracing::debug!(entity = definition.name, table = definition.table, "Schema ensured");
        }
        Ok(())
    }

    async fn find_one(&self, condition: &str, value: &str) -> Result<Option<User>, UserError> {
        let sql = format!("SELECT {} FROM users WHERE {} = $1", USER_COLUMNS, condition);
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| UserError::DatabaseError(e.to_string()))?;

        row.map(User::try_from).transpose()
    }

    async fn update_returning(
        &self,
        query: sqlx::query::QueryAs<'_, sqlx::Postgres, UserRow, sqlx::postgres::PgArguments>,
    ) -> Result<Option<User>, UserError> {
        let row: Option<UserRow> = query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| UserError::DatabaseError(e.to_string()))?;

        row.map(User::try_from).transpose()
    }

    fn map_write_error(e: sqlx::Error, user: &User) -> UserError {
        if let Some(db_err) = e.as_database_error() {
            if db_err.is_unique_violation() {
                if db_err.constraint() == Some("users_username_key") {
                    return UserError::UsernameAlreadyExists(user.username.to_string());
                }
                if db_err.constraint() == Some("users_email_key") {
                    return UserError::EmailAlreadyExists(user.email.to_string());
                }
            }
        }
        UserError::DatabaseError(e.to_string())
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create(&self, user: User) -> Result<User, UserError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, is_active, created_at,
                               updated_at, password_changed_at, password_reset_token,
                               password_reset_expires, failed_login_attempts, last_login_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(user.id.0)
        .bind(user.username.as_str())
        .bind(user.email.as_str())
        .bind(&user.credential.password_hash)
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.credential.password_changed_at)
        .bind(&user.credential.password_reset_token)
        .bind(user.credential.password_reset_expires)
        .bind(counter_column(user.credential.failed_login_attempts))
        .bind(user.credential.last_login_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_write_error(e, &user))?;

        Ok(user)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| UserError::DatabaseError(e.to_string()))?;

        row.map(User::try_from).transpose()
    }

    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, UserError> {
        self.find_one("username", username.as_str()).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserError> {
        self.find_one("LOWER(email)", &email.to_lowercase()).await
    }

    async fn record_login_success(
        &self,
        id: &UserId,
        verified_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<User>, UserError> {
        let sql = format!(
            "UPDATE users SET failed_login_attempts = 0, last_login_at = $3 \
             WHERE id = $1 AND password_hash = $2 AND is_active RETURNING {}",
            USER_COLUMNS
        );
        self.update_returning(sqlx::query_as(&sql).bind(id.0).bind(verified_hash).bind(at))
            .await
    }

    async fn record_login_failure(&self, id: &UserId) -> Result<Option<u32>, UserError> {
        // Saturates instead of overflowing the INTEGER column.
        let attempts: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET failed_login_attempts = LEAST(failed_login_attempts, 2147483646) + 1
            WHERE id = $1
            RETURNING failed_login_attempts
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| UserError::DatabaseError(e.to_string()))?;

        Ok(attempts.map(|n| n.max(0) as u32))
    }

    async fn replace_credential(
        &self,
        id: &UserId,
        previous_hash: &str,
        credential: &Credential,
        at: DateTime<Utc>,
    ) -> Result<Option<User>, UserError> {
        let sql = format!(
            "UPDATE users SET password_hash = $3, password_changed_at = $4, \
             password_reset_token = $5, password_reset_expires = $6, updated_at = $7 \
             WHERE id = $1 AND password_hash = $2 RETURNING {}",
            USER_COLUMNS
        );
        self.update_returning(
            sqlx::query_as(&sql)
                .bind(id.0)
                .bind(previous_hash)
                .bind(&credential.password_hash)
                .bind(credential.password_changed_at)
                .bind(&credential.password_reset_token)
                .bind(credential.password_reset_expires)
                .bind(at),
        )
        .await
    }

    async fn deactivate(&self, id: &UserId, at: DateTime<Utc>) -> Result<Option<User>, UserError> {
        let sql = format!(
            "UPDATE users SET is_active = FALSE, updated_at = $2 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        self.update_returning(sqlx::query_as(&sql).bind(id.0).bind(at))
            .await
    }
}

fn counter_column(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_column_saturates() {
        assert_eq!(counter_column(0), 0);
        assert_eq!(counter_column(7), 7);
        assert_eq!(counter_column(u32::MAX), i32::MAX);
    }
}
