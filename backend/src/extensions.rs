use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::Extension;
use axum_extra::extract::CookieJar;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, HeaderMapExt};
use log::{debug, error};
use tap::TapFallible;

use types::domain::User;

use crate::domain::auth::{AuthState, Session};
use crate::routes::Api;

/// Session token from the cookie, falling back to an `Authorization: Bearer` header.
pub fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(cookie_name).filter(|c| !c.value().is_empty()) {
        return Some(cookie.value().to_string());
    }
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|Authorization(bearer)| bearer.token().to_string())
        .filter(|token| !token.is_empty())
}

async fn extract_api<S: Send + Sync>(parts: &mut Parts, state: &S) -> Result<Api, StatusCode> {
    let Extension(api) = Extension::<Api>::from_request_parts(parts, state)
        .await
        .tap_err(|e| error!("Failed to extract API: {}", e))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(api)
}

/// The raw token, if the request carries one. Never rejects.
#[derive(Debug, Clone)]
pub struct SessionToken(pub Option<String>);

impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let api = extract_api(parts, state).await?;
        Ok(SessionToken(session_token(&parts.headers, api.cookies.name())))
    }
}

/// Authentication state of the caller. Never rejects.
#[derive(Debug, Clone)]
pub struct MaybeSession(pub AuthState);

impl<S> FromRequestParts<S> for MaybeSession
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let api = extract_api(parts, state).await?;
        let state = match session_token(&parts.headers, api.cookies.name()) {
            Some(token) => api.auth_service.validate(&token).await,
            None => AuthState::Unauthenticated,
        };
        Ok(MaybeSession(state))
    }
}

/// Requires an authenticated caller, rejecting with 401 otherwise.
#[derive(Debug, Clone)]
pub struct ExtractSession {
    pub user: User,
    pub session: Session,
}

impl<S> FromRequestParts<S> for ExtractSession
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let MaybeSession(auth_state) = MaybeSession::from_request_parts(parts, state).await?;
        match auth_state {
            AuthState::Authenticated { user, session } => Ok(ExtractSession { user, session }),
            AuthState::Unauthenticated => {
                debug!("Rejecting unauthenticated request to {}", parts.uri.path());
                Err(StatusCode::UNAUTHORIZED)
            }
        }
    }
}
