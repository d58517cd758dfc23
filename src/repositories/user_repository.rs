//! Repositorio de usuarios y tokens activos
//!
//! `active_tokens` impone una sesión viva por usuario: el login se
//! rechaza mientras exista un token sin expirar.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::user::{User, UserRole, UserStatus};
use crate::utils::errors::{AppError, AppResult};

pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        email: &str,
        password_hash: &str,
        role: UserRole,
        attrs: serde_json::Value,
    ) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash, role, status, attrs)
            VALUES ($1, $2, $3, $4, 'ACTIVE', $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .bind(Json(attrs))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::InvalidStatus(format!("user with email '{}' already exists", email))
            }
            other => AppError::Database(other),
        })?;

        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn find_by_id(&self, user_id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Existencia y estado de la cuenta, para el middleware de auth
    pub async fn account_status(&self, user_id: Uuid) -> AppResult<Option<UserStatus>> {
        let status: Option<UserStatus> =
            sqlx::query_scalar("SELECT status FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(status)
    }

    pub async fn has_active_token(&self, user_id: Uuid) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM active_tokens WHERE user_id = $1 AND expires_at > NOW())",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    pub async fn save_active_token(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        // Los tokens vencidos se pisan; uno vivo mantiene la sesión única
        sqlx::query("DELETE FROM active_tokens WHERE user_id = $1 AND expires_at <= NOW()")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "INSERT INTO active_tokens (id, user_id, token, expires_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn delete_active_token(&self, user_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM active_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
