use eyre::Result;
use sqlx::types::Uuid;
use sqlx::{PgPool, Row};

use types::error::Error;

use crate::domain::auth::AuthUser;

/// A concurrent sign-up can pass the `exists` check and still lose the race
/// on the unique email index; that loser gets the same 409 as everyone else.
fn map_duplicate_email(e: sqlx::Error) -> eyre::Report {
    match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => Error::EmailAlreadyExists.into(),
        e => e.into(),
    }
}

/// Credential side of the `users` table.
#[cfg_attr(test, faux::create)]
pub struct AuthUserRepository {
    pool: PgPool,
}

#[cfg_attr(test, faux::methods)]
impl AuthUserRepository {
    pub fn new(pool: PgPool) -> Self {
        AuthUserRepository { pool }
    }

    pub async fn create_user(
        &self,
        email: String,
        hashed_password: String,
        name: String,
    ) -> Result<AuthUser> {
        sqlx::query_as(
            r#"
            INSERT INTO users (id, email, hashed_password, name)
            VALUES ($1, $2, $3, $4) RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(map_duplicate_email)
    }

    pub async fn get_by_email(&self, email: String) -> Result<Option<AuthUser>> {
        sqlx::query_as(
            r#"
            SELECT * FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    pub async fn exists(&self, email: String) -> Result<bool> {
        sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM users
                WHERE email = $1
            )
            "#,
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map(|row| row.get(0))
        .map_err(Into::into)
    }

    pub async fn update_password(&self, user_id: Uuid, hashed_password: String) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET hashed_password = $1, updated_at = now()
            WHERE id = $2
            "#,
        )
        .bind(hashed_password)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;
    use std::fmt;

    use sqlx::error::{DatabaseError, ErrorKind};

    use super::*;

    #[derive(Debug)]
    struct PgError {
        code: &'static str,
        kind: ErrorKind,
    }

    impl fmt::Display for PgError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "database error {}", self.code)
        }
    }

    impl std::error::Error for PgError {}

    impl DatabaseError for PgError {
        fn message(&self) -> &str {
            "database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.code))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            match self.kind {
                ErrorKind::UniqueViolation => ErrorKind::UniqueViolation,
                _ => ErrorKind::Other,
            }
        }
    }

    #[test]
    fn test_unique_violation_is_duplicate_email() {
        let e = sqlx::Error::Database(Box::new(PgError {
            code: "23505",
            kind: ErrorKind::UniqueViolation,
        }));
        let report = map_duplicate_email(e);
        assert!(matches!(
            report.downcast_ref::<Error>(),
            Some(Error::EmailAlreadyExists)
        ));
    }

    #[test]
    fn test_other_database_errors_pass_through() {
        let e = sqlx::Error::Database(Box::new(PgError {
            code: "23503",
            kind: ErrorKind::ForeignKeyViolation,
        }));
        let report = map_duplicate_email(e);
        assert!(report.downcast_ref::<Error>().is_none());

        let report = map_duplicate_email(sqlx::Error::RowNotFound);
        assert!(report.downcast_ref::<sqlx::Error>().is_some());
    }
}
