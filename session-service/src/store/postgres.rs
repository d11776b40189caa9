//! Postgres-backed UserStore.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use super::{ProfileUpdate, StoreError, UserStore};
use crate::models::{Status, User};

const USER_COLUMNS: &str = "id, email, password_hash, username, avatar, status, \
     two_factor_enabled, two_factor_secret, profile_complete, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(sqlx::Error::Migrate(Box::new(e))))
    }

    fn map_insert_error(e: sqlx::Error) -> StoreError {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate,
            _ => StoreError::Database(e),
        }
    }

    fn require_row(rows_affected: u64) -> Result<(), StoreError> {
        if rows_affected == 0 {
            Err(StoreError::NotFound)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users \
             (id, email, password_hash, username, avatar, status, two_factor_enabled, \
              two_factor_secret, profile_complete, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.username)
        .bind(&user.avatar)
        .bind(&user.status)
        .bind(user.two_factor_enabled)
        .bind(&user.two_factor_secret)
        .bind(user.profile_complete)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(Self::map_insert_error)?;
        Ok(())
    }

    async fn update_status(&self, id: Uuid, status: Status) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Self::require_row(result.rows_affected())
    }

    async fn set_two_factor_secret(&self, id: Uuid, secret: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE users SET two_factor_secret = $2, two_factor_enabled = FALSE, \
             updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(secret)
        .execute(&self.pool)
        .await?;
        Self::require_row(result.rows_affected())
    }

    async fn enable_two_factor(&self, id: Uuid) -> Result<(), StoreError> {
        // The secret guard keeps the flag and secret consistent even if a
        // concurrent disable cleared the secret between check and update.
        let result = sqlx::query(
            "UPDATE users SET two_factor_enabled = TRUE, updated_at = now() \
             WHERE id = $1 AND two_factor_secret IS NOT NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Self::require_row(result.rows_affected())
    }

    async fn disable_two_factor(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE users SET two_factor_enabled = FALSE, two_factor_secret = NULL, \
             updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Self::require_row(result.rows_affected())
    }

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE users SET username = COALESCE($2, username), \
             avatar = COALESCE($3, avatar), updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(update.username)
        .bind(update.avatar)
        .execute(&self.pool)
        .await
        .map_err(Self::map_insert_error)?;
        Self::require_row(result.rows_affected())
    }

    async fn mark_profile_complete(&self, id: Uuid) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE users SET profile_complete = TRUE, updated_at = now() WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;
        Self::require_row(result.rows_affected())
    }
}
