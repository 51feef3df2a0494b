use std::sync::Arc;

use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use eyre::{bail, ensure, ContextCompat, Result};
use log::{debug, error, info};
use sqlx::types::Uuid;

use types::error::Error;

use crate::domain::auth::{AuthState, IssuedSession, Session};
use crate::domain::request::RequestMeta;
use crate::repository::auth::AuthUserRepository;
use crate::repository::oauth_accounts::OAuthAccountRepository;
use crate::repository::password_resets::PasswordResetRepository;
use crate::repository::sessions::SessionRepository;
use crate::repository::users::UserRepository;
use crate::repository::Repositories;
use crate::service::oauth::{GoogleClaims, GoogleVerifier, GOOGLE_PROVIDER};
use crate::service::token::{SessionClaims, TokenSigner, SESSION_TTL_DAYS};

const RESET_TOKEN_TTL_HOURS: i64 = 1;

#[derive(Clone)]
pub struct AuthService {
    pub auth_repository: Arc<AuthUserRepository>,
    pub user_repository: Arc<UserRepository>,
    pub session_repository: Arc<SessionRepository>,
    pub reset_repository: Arc<PasswordResetRepository>,
    pub oauth_repository: Arc<OAuthAccountRepository>,
    pub signer: TokenSigner,
    pub google: Option<Arc<GoogleVerifier>>,
    pub hash_cost: u32,
    /// Checked against when there is no real hash, so every failed sign-in costs one bcrypt verify.
    pub dummy_hash: String,
    pub frontend_url: Option<String>,
}

impl AuthService {
    pub fn new(
        repositories: Repositories,
        signer: TokenSigner,
        google: Option<GoogleVerifier>,
        frontend_url: Option<String>,
        hash_cost: u32,
    ) -> Result<Self> {
        Ok(Self {
            auth_repository: Arc::new(repositories.auth),
            user_repository: Arc::new(repositories.users),
            session_repository: Arc::new(repositories.sessions),
            reset_repository: Arc::new(repositories.resets),
            oauth_repository: Arc::new(repositories.oauth_accounts),
            signer,
            google: google.map(Arc::new),
            hash_cost,
            dummy_hash: hash(Uuid::new_v4().to_string(), hash_cost)?,
            frontend_url,
        })
    }

    /// Creates the account and signs it in straight away.
    pub async fn sign_up(
        &self,
        email: String,
        password: String,
        name: String,
        meta: RequestMeta,
    ) -> Result<IssuedSession> {
        ensure!(
            !self.auth_repository.exists(email.clone()).await?,
            Error::EmailAlreadyExists
        );
        let hashed_password = hash(password, self.hash_cost)?;
        let user = self
            .auth_repository
            .create_user(email, hashed_password, name)
            .await?;
        info!("User {} signed up", user.id);
        self.issue(user.id, meta).await
    }

    /// Every credential failure collapses into the same error so callers
    /// cannot tell which part was wrong.
    pub async fn sign_in(
        &self,
        email: String,
        password: String,
        meta: RequestMeta,
    ) -> Result<IssuedSession> {
        let Some(user) = self.auth_repository.get_by_email(email).await? else {
            debug!("Sign-in for unknown email");
            verify(password, &self.dummy_hash)?;
            bail!(Error::InvalidCredentials);
        };
        let password_matches = verify(password, &user.hashed_password)?;
        ensure!(password_matches && user.is_active, Error::InvalidCredentials);
        self.issue(user.id, meta).await
    }

    async fn issue(&self, user_id: Uuid, meta: RequestMeta) -> Result<IssuedSession> {
        let user = self
            .user_repository
            .get(user_id)
            .await?
            .wrap_err("User not found")?;

        let session_id = Uuid::new_v4();
        let token = self.signer.issue(session_id, user_id)?;
        let expires_at = Utc::now() + Duration::days(SESSION_TTL_DAYS);
        let session = self
            .session_repository
            .insert(session_id, user_id, expires_at, meta)
            .await?;
        info!("Issued session {} for user {}", session.id, user_id);

        Ok(IssuedSession {
            user,
            session,
            token,
        })
    }

    /// Signs in with a Google ID token. The Google account is linked to the
    /// local user with the same verified email, or a new user is created.
    pub async fn sign_in_with_google(
        &self,
        id_token: String,
        meta: RequestMeta,
    ) -> Result<IssuedSession> {
        let Some(google) = &self.google else {
            bail!(Error::OAuthUnavailable);
        };
        let claims = match google.verify(id_token).await {
            Ok(claims) => claims,
            Err(e) => {
                debug!("Rejected Google ID token: {}", e);
                bail!(Error::InvalidCredentials);
            }
        };

        let linked = self
            .oauth_repository
            .find_user(GOOGLE_PROVIDER.to_string(), claims.sub.clone())
            .await?;
        let user_id = match linked {
            Some(user_id) => user_id,
            None => self.link_google_account(&claims).await?,
        };

        let active = self
            .user_repository
            .get(user_id)
            .await?
            .is_some_and(|user| user.is_active);
        ensure!(active, Error::InvalidCredentials);
        self.issue(user_id, meta).await
    }

    async fn link_google_account(&self, claims: &GoogleClaims) -> Result<Uuid> {
        let Some(email) = claims.verified_email() else {
            debug!("Google account {} has no verified email", claims.sub);
            bail!(Error::InvalidCredentials);
        };
        let user_id = match self.auth_repository.get_by_email(email.to_string()).await? {
            Some(user) => user.id,
            None => {
                let name = claims
                    .name
                    .clone()
                    .unwrap_or_else(|| email.split('@').next().unwrap_or(email).to_string());
                // nobody knows this password; the account signs in through Google
                let hashed_password = hash(Uuid::new_v4().to_string(), self.hash_cost)?;
                let user = self
                    .auth_repository
                    .create_user(email.to_string(), hashed_password, name)
                    .await?;
                info!("User {} signed up with Google", user.id);
                user.id
            }
        };
        self.oauth_repository
            .link(GOOGLE_PROVIDER.to_string(), claims.sub.clone(), user_id)
            .await?;
        Ok(user_id)
    }

    /// Resolves a token to the session it names. Only the stored row counts;
    /// if the store cannot be reached the caller is treated as signed out.
    pub async fn validate(&self, token: &str) -> AuthState {
        let claims = match self.signer.verify(token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!("Rejected session token: {}", e);
                return AuthState::Unauthenticated;
            }
        };
        match self.lookup(&claims).await {
            Ok(state) => state,
            Err(e) => {
                error!(
                    "Session store unavailable, treating request as unauthenticated: {:?}",
                    e
                );
                AuthState::Unauthenticated
            }
        }
    }

    async fn lookup(&self, claims: &SessionClaims) -> Result<AuthState> {
        let Some(session) = self.session_repository.get(claims.session_id).await? else {
            debug!("Session {} no longer exists", claims.session_id);
            return Ok(AuthState::Unauthenticated);
        };
        if session.user_id != claims.user_id || !session.is_live(Utc::now()) {
            debug!("Session {} is expired or mismatched", session.id);
            return Ok(AuthState::Unauthenticated);
        }
        match self.user_repository.get(session.user_id).await? {
            Some(user) if user.is_active => Ok(AuthState::Authenticated { user, session }),
            _ => {
                debug!("Owner of session {} is missing or deactivated", session.id);
                Ok(AuthState::Unauthenticated)
            }
        }
    }

    /// Deletes the session behind `token`. Returns whether a row was removed;
    /// an unverifiable token has nothing to delete.
    pub async fn sign_out(&self, token: &str) -> Result<bool> {
        let Ok(claims) = self.signer.verify(token) else {
            return Ok(false);
        };
        let deleted = self
            .session_repository
            .delete_for_user(claims.user_id, claims.session_id)
            .await?;
        if deleted {
            info!("Session {} signed out", claims.session_id);
        }
        Ok(deleted)
    }

    pub async fn list_sessions(&self, user_id: Uuid) -> Result<Vec<Session>> {
        self.session_repository.list_for_user(user_id).await
    }

    pub async fn revoke_session(&self, user_id: Uuid, session_id: Uuid) -> Result<()> {
        ensure!(
            self.session_repository
                .delete_for_user(user_id, session_id)
                .await?,
            Error::SessionNotFound
        );
        info!("User {} revoked session {}", user_id, session_id);
        Ok(())
    }

    /// Soft-deactivates the account; the row stays, every session goes.
    pub async fn deactivate_account(&self, user_id: Uuid) -> Result<()> {
        self.user_repository
            .set_active(user_id, false)
            .await?
            .wrap_err("User not found")?;
        let revoked = self
            .session_repository
            .delete_all_for_user(user_id)
            .await?;
        info!("User {} deactivated, {} sessions revoked", user_id, revoked);
        Ok(())
    }

    /// Answers the same way whether or not the email is registered.
    pub async fn forgot_password(&self, email: String) -> Result<()> {
        let Some(user) = self.auth_repository.get_by_email(email).await? else {
            debug!("Password reset requested for unknown email");
            return Ok(());
        };
        let expires_at = Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS);
        let reset = self
            .reset_repository
            .insert(Uuid::new_v4(), user.id, expires_at)
            .await?;
        self.deliver_reset_link(&user.email, reset.token);
        Ok(())
    }

    fn deliver_reset_link(&self, email: &str, token: Uuid) {
        let base = self.frontend_url.as_deref().unwrap_or("");
        info!(
            "Password reset link for {}: {}/reset-password?token={}",
            email, base, token
        );
    }

    /// Consumes the reset token, stores the new hash and signs the user out everywhere.
    pub async fn reset_password(&self, token: Uuid, new_password: String) -> Result<()> {
        let reset = self
            .reset_repository
            .take(token)
            .await?
            .ok_or(Error::InvalidResetToken)?;
        ensure!(reset.expires_at > Utc::now(), Error::InvalidResetToken);

        let hashed_password = hash(new_password, self.hash_cost)?;
        self.auth_repository
            .update_password(reset.user_id, hashed_password)
            .await?;
        let revoked = self
            .session_repository
            .delete_all_for_user(reset.user_id)
            .await?;
        info!(
            "Password reset for user {}, {} sessions revoked",
            reset.user_id, revoked
        );
        Ok(())
    }

    /// Binds a Socket.IO connection to the session its token names.
    pub async fn connect_socket(&self, token: &str, socket_id: String) -> Result<Option<Session>> {
        match self.validate(token).await {
            AuthState::Authenticated { session, .. } => {
                self.session_repository
                    .mark_online(session.id, socket_id)
                    .await
            }
            AuthState::Unauthenticated => Ok(None),
        }
    }

    /// Takes the session offline, unless a newer socket has bound to it since.
    pub async fn disconnect_socket(
        &self,
        session_id: Uuid,
        socket_id: String,
    ) -> Result<Option<Session>> {
        let session = self
            .session_repository
            .mark_offline(session_id, socket_id.clone())
            .await?;
        if session.is_none() {
            debug!(
                "Socket {} no longer holds session {}, leaving presence as is",
                socket_id, session_id
            );
        }
        Ok(session)
    }

    pub async fn purge_expired(&self) -> Result<(u64, u64)> {
        let sessions = self.session_repository.delete_expired().await?;
        let resets = self.reset_repository.delete_expired().await?;
        Ok((sessions, resets))
    }
}
