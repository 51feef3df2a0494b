use sqlx::PgPool;

use crate::repository::auth::AuthUserRepository;
use crate::repository::oauth_accounts::OAuthAccountRepository;
use crate::repository::password_resets::PasswordResetRepository;
use crate::repository::sessions::SessionRepository;
use crate::repository::users::UserRepository;

pub mod auth;
pub mod oauth_accounts;
pub mod password_resets;
pub mod sessions;
pub mod users;

/// Every table the auth service touches.
pub struct Repositories {
    pub auth: AuthUserRepository,
    pub users: UserRepository,
    pub sessions: SessionRepository,
    pub resets: PasswordResetRepository,
    pub oauth_accounts: OAuthAccountRepository,
}

impl Repositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            auth: AuthUserRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            sessions: SessionRepository::new(pool.clone()),
            resets: PasswordResetRepository::new(pool.clone()),
            oauth_accounts: OAuthAccountRepository::new(pool),
        }
    }
}
