use std::net::SocketAddr;
use std::str::FromStr;
use std::time::{Duration, Instant};

use axum::extract::OriginalUri;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{any, get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use eyre::Result;
use log::{debug, error, info};
use refinery::config::Config as MigrationConfig;
use serde_json::json;
use socketioxide::extract::Extension as SocketExtension;
use socketioxide::extract::{Data, HttpExtension};
use socketioxide::{extract::SocketRef, SocketIo};
use sqlx::types::Uuid;
use sqlx::PgPool;
use tap::TapFallible;
use tower_http::services::ServeDir;

use crate::config::{Config, HttpConfig};
use crate::domain::request::RequestMeta;
use crate::extensions::{ExtractSession, MaybeSession, SessionToken};
use crate::layers::RateLimiter;
use crate::routes::Api;
use types::domain::{
    ForgotPasswordRequest, GoogleSignInRequest, HealthResponse, LoginRequest,
    ResetPasswordRequest, RevokeSessionRequest, ServiceEvent, SignupRequest, SocketAuth,
    SuccessResponse,
};
use types::error::Error;

mod config;
mod domain;
mod error;
mod extensions;
mod guard;
mod layers;
mod repository;
mod routes;
mod service;
#[cfg(test)]
mod testing;

refinery::embed_migrations!("migrations");

const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    // setup log
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = Config::from_env().tap_err(|e| error!("Refusing to start: {}", e))?;
    info!("server starts in {:?} mode", config.environment);

    // run migrations
    let mut migration_config = MigrationConfig::from_str(&config.database_url)?;
    migrations::runner().run_async(&mut migration_config).await?;
    let pool = PgPool::connect(&config.database_url)
        .await
        .tap_err(|e| error!("Refusing to start, database unreachable: {}", e))?;

    let api = Api::new(pool, &config)?;
    let limiter = RateLimiter::new(config.http.rate_limit);
    spawn_purge_task(api.clone(), limiter.clone());

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!("listening on {}", config.listen_addr);
    let app = app(api, &config.http, limiter);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

fn app(api: Api, http: &HttpConfig, limiter: RateLimiter) -> Router {
    // setting up websocket
    let (socket_layer, io) = SocketIo::new_layer();
    io.ns("/", connection_handler);

    let api_routes = Router::new()
        .route("/api/health", get(health))
        .route("/api/me", get(me))
        .route("/api/auth/sign-up", post(sign_up))
        .route("/api/auth/sign-in", post(sign_in))
        .route("/api/auth/sign-in/google", post(sign_in_with_google))
        .route("/api/auth/sign-out", post(sign_out))
        .route("/api/auth/forgot-password", post(forgot_password))
        .route("/api/auth/reset-password", post(reset_password))
        .route("/api/auth/list-sessions", get(list_sessions))
        .route("/api/auth/revoke-session", post(revoke_session))
        .route("/api/auth/deactivate", post(deactivate))
        .route("/api", any(not_found))
        .route("/api/{*rest}", any(not_found))
        .layer(middleware::from_fn_with_state(limiter, layers::rate_limit));

    // pages sit behind the route guard
    let router = Router::new().merge(api_routes);
    let router = match &http.static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router.fallback(not_found),
    };

    let router = router
        .layer(middleware::from_fn(guard::route_guard))
        .layer(socket_layer)
        .layer(Extension(api));
    layers::with_security_headers(router, http.environment).layer(layers::cors_layer(http))
}

fn spawn_purge_task(api: Api, limiter: RateLimiter) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match api.auth_service.purge_expired().await {
                Ok((sessions, resets)) => {
                    debug!("Purged {} sessions and {} reset tokens", sessions, resets)
                }
                Err(e) => error!("Failed to purge expired sessions: {:?}", e),
            }
            debug!("Dropped {} rate limit windows", limiter.prune(Instant::now()));
        }
    });
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "success".to_string(),
        timestamp: Utc::now(),
    })
}

async fn me(Extension(api): Extension<Api>, MaybeSession(state): MaybeSession) -> impl IntoResponse {
    Json(api.me(state))
}

async fn sign_up(
    Extension(api): Extension<Api>,
    headers: HeaderMap,
    Json(payload): Json<SignupRequest>,
) -> impl IntoResponse {
    match api.sign_up(payload, RequestMeta::from_headers(&headers)).await {
        Ok((cookies, response)) => (StatusCode::CREATED, cookies, Json(response)).into_response(),
        Err(e) => report_into_response(e).into_response(),
    }
}

async fn sign_in(
    Extension(api): Extension<Api>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> impl IntoResponse {
    match api.sign_in(payload, RequestMeta::from_headers(&headers)).await {
        Ok((cookies, response)) => (StatusCode::OK, cookies, Json(response)).into_response(),
        Err(e) => report_into_response(e).into_response(),
    }
}

async fn sign_in_with_google(
    Extension(api): Extension<Api>,
    headers: HeaderMap,
    Json(payload): Json<GoogleSignInRequest>,
) -> impl IntoResponse {
    match api
        .sign_in_with_google(payload, RequestMeta::from_headers(&headers))
        .await
    {
        Ok((cookies, response)) => (StatusCode::OK, cookies, Json(response)).into_response(),
        Err(e) => report_into_response(e).into_response(),
    }
}

async fn sign_out(
    Extension(api): Extension<Api>,
    SessionToken(token): SessionToken,
) -> impl IntoResponse {
    match api.sign_out(token).await {
        Ok(cookies) => (StatusCode::OK, cookies, Json(SuccessResponse::ok())).into_response(),
        Err(e) => {
            // the cookie goes either way
            let cookies = api.clear_cookies().unwrap_or_default();
            (cookies, report_into_response(e)).into_response()
        }
    }
}

async fn forgot_password(
    Extension(api): Extension<Api>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> impl IntoResponse {
    match api.forgot_password(payload).await {
        Ok(_) => (StatusCode::OK, Json(SuccessResponse::ok())).into_response(),
        Err(e) => report_into_response(e).into_response(),
    }
}

async fn reset_password(
    Extension(api): Extension<Api>,
    Json(payload): Json<ResetPasswordRequest>,
) -> impl IntoResponse {
    match api.reset_password(payload).await {
        Ok(_) => (StatusCode::OK, Json(SuccessResponse::ok())).into_response(),
        Err(e) => report_into_response(e).into_response(),
    }
}

async fn list_sessions(
    Extension(api): Extension<Api>,
    current: ExtractSession,
) -> impl IntoResponse {
    match api.list_sessions(current.user.id).await {
        Ok(sessions) => (StatusCode::OK, Json(sessions)).into_response(),
        Err(e) => report_into_response(e).into_response(),
    }
}

async fn revoke_session(
    Extension(api): Extension<Api>,
    current: ExtractSession,
    Json(payload): Json<RevokeSessionRequest>,
) -> impl IntoResponse {
    match api.revoke_session(current.user.id, payload.session_id).await {
        // revoking the session in use signs this client out too
        Ok(_) if payload.session_id == current.session.id => {
            let cookies = api.clear_cookies().unwrap_or_default();
            (StatusCode::OK, cookies, Json(SuccessResponse::ok())).into_response()
        }
        Ok(_) => (StatusCode::OK, Json(SuccessResponse::ok())).into_response(),
        Err(e) => report_into_response(e).into_response(),
    }
}

async fn deactivate(Extension(api): Extension<Api>, current: ExtractSession) -> impl IntoResponse {
    match api.deactivate_account(current.user.id).await {
        Ok(cookies) => (StatusCode::OK, cookies, Json(SuccessResponse::ok())).into_response(),
        Err(e) => report_into_response(e).into_response(),
    }
}

async fn not_found(OriginalUri(uri): OriginalUri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "status": "error",
            "message": format!("Route {} not found", uri.path()),
        })),
    )
}

async fn connection_handler(
    s: SocketRef,
    Data(auth): Data<SocketAuth>,
    HttpExtension(api): HttpExtension<Api>,
) {
    match api.connect_socket(&auth.token, s.id.to_string()).await {
        Ok(Some(session)) => {
            debug!("Socket {} bound to session {}", s.id, session.id);
            s.extensions.insert(session.id);
            let _ = s.emit(ServiceEvent::SessionBound, &session.info());
            s.on_disconnect(handle_disconnect);
        }
        Ok(None) => {
            info!("Socket {} rejected: no valid session", s.id);
            let _ = s.emit(ServiceEvent::ServiceError, &Error::Unauthenticated.to_string());
            let _ = s.disconnect();
        }
        Err(e) => {
            let (_, message) = report_into_response(e);
            let _ = s.emit(ServiceEvent::ServiceError, &message);
            let _ = s.disconnect();
        }
    }
}

async fn handle_disconnect(
    s: SocketRef,
    SocketExtension(session_id): SocketExtension<Uuid>,
    HttpExtension(api): HttpExtension<Api>,
) {
    debug!("Socket {} disconnected", s.id);
    if let Err(e) = api
        .auth_service
        .disconnect_socket(session_id, s.id.to_string())
        .await
    {
        error!("Failed to mark session {} offline: {:?}", session_id, e);
    }
}

fn report_into_response(e: eyre::Report) -> (StatusCode, String) {
    error!("Error occurred: {:?}", e);
    match e.downcast::<Error>() {
        Ok(error) => error.into_response_tuple(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "".to_string()),
    }
}
