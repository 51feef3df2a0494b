use eyre::Result;
use sqlx::types::Uuid;
use sqlx::{PgPool, Row};

/// Links an external identity (`provider`, `subject`) to a local user.
#[cfg_attr(test, faux::create)]
pub struct OAuthAccountRepository {
    pool: PgPool,
}

#[cfg_attr(test, faux::methods)]
impl OAuthAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_user(&self, provider: String, subject: String) -> Result<Option<Uuid>> {
        sqlx::query(
            r#"
            SELECT user_id FROM oauth_accounts
            WHERE provider = $1 AND subject = $2
            "#,
        )
        .bind(provider)
        .bind(subject)
        .fetch_optional(&self.pool)
        .await
        .map(|row| row.map(|row| row.get(0)))
        .map_err(Into::into)
    }

    pub async fn link(&self, provider: String, subject: String, user_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO oauth_accounts (provider, subject, user_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (provider, subject) DO NOTHING
            "#,
        )
        .bind(provider)
        .bind(subject)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
