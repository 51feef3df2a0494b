use eyre::Result;
use sqlx::types::Uuid;

use types::domain::User;

/// Profile side of the `users` table. Users are never deleted, only deactivated.
#[cfg_attr(test, faux::create)]
pub struct UserRepository {
    pool: sqlx::PgPool,
}

#[cfg_attr(test, faux::methods)]
impl UserRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<User>> {
        sqlx::query_as(
            r#"
            SELECT * FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    pub async fn set_active(&self, id: Uuid, is_active: bool) -> Result<Option<User>> {
        sqlx::query_as(
            r#"
            UPDATE users
            SET is_active = $1, updated_at = now()
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(is_active)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }
}
