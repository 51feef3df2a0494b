use eyre::Result;
use sqlx::types::chrono::{DateTime, Utc};
use sqlx::types::Uuid;
use sqlx::PgPool;

use types::domain::PresenceStatus;

use crate::domain::auth::Session;
use crate::domain::request::RequestMeta;

/// The `sessions` table is the only authority on whether a session exists.
#[cfg_attr(test, faux::create)]
pub struct SessionRepository {
    pool: PgPool,
}

#[cfg_attr(test, faux::methods)]
impl SessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        id: Uuid,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
        meta: RequestMeta,
    ) -> Result<Session> {
        sqlx::query_as(
            r#"
            INSERT INTO sessions (id, user_id, expires_at, status, device, user_agent, ip_address)
            VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(expires_at)
        .bind(PresenceStatus::Offline.as_ref().to_string())
        .bind(meta.device)
        .bind(meta.user_agent)
        .bind(meta.ip_address)
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Session>> {
        sqlx::query_as(
            r#"
            SELECT * FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Session>> {
        sqlx::query_as(
            r#"
            SELECT * FROM sessions
            WHERE user_id = $1 AND is_active AND expires_at > now()
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    /// Returns whether a row was removed.
    pub async fn delete_for_user(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_expired(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE expires_at <= now()
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn mark_online(&self, id: Uuid, socket_id: String) -> Result<Option<Session>> {
        sqlx::query_as(
            r#"
            UPDATE sessions
            SET socket_id = $1, status = $2, last_seen = now(), updated_at = now()
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(socket_id)
        .bind(PresenceStatus::Online.as_ref().to_string())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    /// Only the socket currently bound to the session can take it offline.
    pub async fn mark_offline(&self, id: Uuid, socket_id: String) -> Result<Option<Session>> {
        sqlx::query_as(
            r#"
            UPDATE sessions
            SET socket_id = NULL, status = $1, last_seen = now(), updated_at = now()
            WHERE id = $2 AND socket_id = $3
            RETURNING *
            "#,
        )
        .bind(PresenceStatus::Offline.as_ref().to_string())
        .bind(id)
        .bind(socket_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }
}
