use eyre::Result;
use sqlx::types::chrono::{DateTime, Utc};
use sqlx::types::Uuid;
use sqlx::PgPool;

use crate::domain::auth::PasswordReset;

#[cfg_attr(test, faux::create)]
pub struct PasswordResetRepository {
    pool: PgPool,
}

#[cfg_attr(test, faux::methods)]
impl PasswordResetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        token: Uuid,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<PasswordReset> {
        sqlx::query_as(
            r#"
            INSERT INTO password_resets (token, user_id, expires_at)
            VALUES ($1, $2, $3) RETURNING *
            "#,
        )
        .bind(token)
        .bind(user_id)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }

    /// Removes the token and hands it back, so it can be used at most once.
    pub async fn take(&self, token: Uuid) -> Result<Option<PasswordReset>> {
        sqlx::query_as(
            r#"
            DELETE FROM password_resets
            WHERE token = $1
            RETURNING *
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    pub async fn delete_expired(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM password_resets
            WHERE expires_at <= now()
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
