use axum::extract::Request;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Extension;
use log::debug;

use crate::extensions::session_token;
use crate::routes::Api;

pub const SIGN_IN_PATH: &str = "/sign-in";
pub const HOME_PATH: &str = "/home";

const PUBLIC_PATHS: &[&str] = &["/", "/api", "/socket.io"];
const PUBLIC_PREFIXES: &[&str] = &[
    "/api/",
    "/_next/",
    "/favicon.ico",
    "/icons/",
    "/images/",
    "/socket.io/",
];
const AUTH_ONLY_PATHS: &[&str] = &["/sign-in", "/sign-up", "/forgot-password", "/reset-password"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    Protected,
    AuthOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Pass,
    Redirect(&'static str),
}

pub fn classify(path: &str) -> RouteClass {
    if PUBLIC_PATHS.contains(&path) || PUBLIC_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return RouteClass::Public;
    }
    let is_auth_page = AUTH_ONLY_PATHS.iter().any(|page| {
        path.strip_prefix(page)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    });
    if is_auth_page {
        RouteClass::AuthOnly
    } else {
        RouteClass::Protected
    }
}

pub fn decide(class: RouteClass, authenticated: bool) -> GuardDecision {
    match (class, authenticated) {
        (RouteClass::Protected, false) => GuardDecision::Redirect(SIGN_IN_PATH),
        (RouteClass::AuthOnly, true) => GuardDecision::Redirect(HOME_PATH),
        _ => GuardDecision::Pass,
    }
}

/// Redirects signed-out visitors away from protected pages and signed-in
/// visitors away from the auth pages. Public paths skip the session lookup.
pub async fn route_guard(
    Extension(api): Extension<Api>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let class = classify(&path);
    if class == RouteClass::Public {
        return next.run(request).await;
    }

    let authenticated = match session_token(&headers, api.cookies.name()) {
        Some(token) => api.auth_service.validate(&token).await.is_authenticated(),
        None => false,
    };
    match decide(class, authenticated) {
        GuardDecision::Pass => next.run(request).await,
        GuardDecision::Redirect(target) => {
            debug!("Redirecting {} to {}", path, target);
            Redirect::to(target).into_response()
        }
    }
}
