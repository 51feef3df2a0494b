use axum::http::HeaderMap;
use bcrypt::DEFAULT_COST;
use eyre::Result;
use sqlx::types::Uuid;
use sqlx::PgPool;
use validator::Validate;

use types::domain::{
    AuthResponse, ForgotPasswordRequest, GoogleSignInRequest, LoginRequest, MeResponse, ResetPasswordRequest,
    SessionInfo, SignupRequest,
};
use types::error::Error;

use crate::config::Config;
use crate::domain::auth::{AuthState, IssuedSession, Session};
use crate::domain::request::RequestMeta;
use crate::repository::Repositories;
use crate::service::auth::AuthService;
use crate::service::cookie::CookiePolicy;
use crate::service::oauth::GoogleVerifier;
use crate::service::token::TokenSigner;

#[derive(Clone)]
pub struct Api {
    pub auth_service: AuthService,
    pub cookies: CookiePolicy,
}

impl Api {
    pub fn new(pool: PgPool, config: &Config) -> Result<Self> {
        Ok(Api {
            auth_service: AuthService::new(
                Repositories::new(pool),
                TokenSigner::new(&config.jwt_secret),
                config.google_client_id.clone().map(GoogleVerifier::new),
                config.frontend_url.clone(),
                DEFAULT_COST,
            )?,
            cookies: CookiePolicy::new(config.cookie.clone()),
        })
    }

    pub async fn sign_up(
        &self,
        request: SignupRequest,
        meta: RequestMeta,
    ) -> Result<(HeaderMap, AuthResponse)> {
        request
            .validate()
            .map_err(|_| Error::InvalidEmailOrPassword)?;
        let issued = self
            .auth_service
            .sign_up(request.email, request.password, request.name, meta)
            .await?;
        self.with_cookie(issued)
    }

    pub async fn sign_in(
        &self,
        request: LoginRequest,
        meta: RequestMeta,
    ) -> Result<(HeaderMap, AuthResponse)> {
        request.validate().map_err(|_| Error::InvalidCredentials)?;
        let issued = self
            .auth_service
            .sign_in(request.email, request.password, meta)
            .await?;
        self.with_cookie(issued)
    }

    pub async fn sign_in_with_google(
        &self,
        request: GoogleSignInRequest,
        meta: RequestMeta,
    ) -> Result<(HeaderMap, AuthResponse)> {
        request.validate().map_err(|_| Error::InvalidCredentials)?;
        let issued = self
            .auth_service
            .sign_in_with_google(request.id_token, meta)
            .await?;
        self.with_cookie(issued)
    }

    fn with_cookie(&self, issued: IssuedSession) -> Result<(HeaderMap, AuthResponse)> {
        let headers = self.cookies.set_session_headers(issued.token.clone())?;
        let response = AuthResponse {
            user: issued.user,
            session: issued.session.info(),
            token: issued.token,
        };
        Ok((headers, response))
    }

    /// Deletes the session (if any) and returns headers that expire every
    /// variant of the session cookie.
    pub async fn sign_out(&self, token: Option<String>) -> Result<HeaderMap> {
        if let Some(token) = token {
            self.auth_service.sign_out(&token).await?;
        }
        self.cookies.clear_session_headers()
    }

    pub fn clear_cookies(&self) -> Result<HeaderMap> {
        self.cookies.clear_session_headers()
    }

    pub fn me(&self, state: AuthState) -> Option<MeResponse> {
        match state {
            AuthState::Authenticated { user, session } => Some(MeResponse {
                user,
                session: session.info(),
            }),
            AuthState::Unauthenticated => None,
        }
    }

    pub async fn forgot_password(&self, request: ForgotPasswordRequest) -> Result<()> {
        request
            .validate()
            .map_err(|_| Error::InvalidEmailOrPassword)?;
        self.auth_service.forgot_password(request.email).await
    }

    pub async fn reset_password(&self, request: ResetPasswordRequest) -> Result<()> {
        request.validate().map_err(|_| Error::PasswordTooShort)?;
        self.auth_service
            .reset_password(request.token, request.new_password)
            .await
    }

    pub async fn list_sessions(&self, user_id: Uuid) -> Result<Vec<SessionInfo>> {
        let sessions = self.auth_service.list_sessions(user_id).await?;
        Ok(sessions.iter().map(Session::info).collect())
    }

    pub async fn revoke_session(&self, user_id: Uuid, session_id: Uuid) -> Result<()> {
        self.auth_service.revoke_session(user_id, session_id).await
    }

    pub async fn deactivate_account(&self, user_id: Uuid) -> Result<HeaderMap> {
        self.auth_service.deactivate_account(user_id).await?;
        self.cookies.clear_session_headers()
    }

    pub async fn connect_socket(&self, token: &str, socket_id: String) -> Result<Option<Session>> {
        self.auth_service.connect_socket(token, socket_id).await
    }
}
