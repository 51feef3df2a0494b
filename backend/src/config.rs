use std::net::SocketAddr;
use std::path::PathBuf;

use axum::http::HeaderValue;
use axum_extra::extract::cookie::SameSite;
use time::Duration;

use crate::error::ConfigError;
use crate::service::token::SESSION_TTL_DAYS;

pub const SESSION_COOKIE: &str = "token";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const LOCAL_FRONTEND: &str = "http://localhost:3000";
const DEFAULT_RATE_LIMIT_MAX: u32 = 100;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 15 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

/// Attributes of the session cookie, resolved once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct CookieConfig {
    pub name: String,
    pub secure: bool,
    pub same_site: SameSite,
    pub domain: Option<String>,
    pub path: String,
    pub http_only: bool,
    pub max_age: Duration,
}

impl CookieConfig {
    /// Production serves the frontend from a sibling subdomain, so the cookie
    /// has to be cross-site and scoped to the parent domain.
    pub fn cross_subdomain(domain: String) -> Self {
        Self {
            name: SESSION_COOKIE.to_string(),
            secure: true,
            same_site: SameSite::None,
            domain: Some(domain),
            path: "/".to_string(),
            http_only: true,
            max_age: Duration::days(SESSION_TTL_DAYS),
        }
    }

    /// Same-origin over plain http: browsers drop `Secure` cookies there.
    pub fn local() -> Self {
        Self {
            name: SESSION_COOKIE.to_string(),
            secure: false,
            same_site: SameSite::Lax,
            domain: None,
            path: "/".to_string(),
            http_only: true,
            max_age: Duration::days(SESSION_TTL_DAYS),
        }
    }

    pub fn for_environment(
        environment: Environment,
        domain: Option<String>,
    ) -> Result<Self, ConfigError> {
        let config = match environment {
            Environment::Production => {
                Self::cross_subdomain(domain.ok_or(ConfigError::MissingCookieDomain)?)
            }
            Environment::Development => Self::local(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.same_site == SameSite::None && !self.secure {
            return Err(ConfigError::InsecureCrossSiteCookie);
        }
        if matches!(&self.domain, Some(domain) if domain.trim().is_empty()) {
            return Err(ConfigError::Empty("COOKIE_DOMAIN"));
        }
        Ok(())
    }
}

/// Requests allowed per client IP on `/api` within one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: std::time::Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_RATE_LIMIT_MAX,
            window: std::time::Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECS),
        }
    }
}

/// Everything the router needs besides the API itself.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
    pub environment: Environment,
    pub static_dir: Option<PathBuf>,
    /// Origins allowed to make credentialed requests. Development accepts any origin.
    pub cors_origins: Vec<String>,
    pub rate_limit: RateLimitConfig,
}

impl HttpConfig {
    pub fn local() -> Self {
        Self {
            environment: Environment::Development,
            static_dir: None,
            cors_origins: vec![LOCAL_FRONTEND.to_string()],
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub database_url: String,
    pub jwt_secret: String,
    pub cookie: CookieConfig,
    pub listen_addr: SocketAddr,
    pub frontend_url: Option<String>,
    pub google_client_id: Option<String>,
    pub http: HttpConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            let value = lookup(name).ok_or(ConfigError::Missing(name))?;
            if value.trim().is_empty() {
                return Err(ConfigError::Empty(name));
            }
            Ok(value)
        };

        let environment = match lookup("APP_ENV").as_deref() {
            None | Some("development") | Some("dev") | Some("local") => Environment::Development,
            Some("production") | Some("prod") => Environment::Production,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "APP_ENV",
                    value: other.to_string(),
                })
            }
        };

        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET")?;
        let cookie = CookieConfig::for_environment(environment, lookup("COOKIE_DOMAIN"))?;

        let listen_addr = lookup("LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr: SocketAddr = listen_addr.parse().map_err(|_| ConfigError::Invalid {
            name: "LISTEN_ADDR",
            value: listen_addr.clone(),
        })?;

        let frontend_url = lookup("FRONTEND_URL").map(|url| url.trim_end_matches('/').to_string());
        let mut cors_origins: Vec<String> = frontend_url.iter().cloned().collect();
        if !cors_origins.iter().any(|origin| origin == LOCAL_FRONTEND) {
            cors_origins.push(LOCAL_FRONTEND.to_string());
        }
        if let Some(origin) = cors_origins
            .iter()
            .find(|origin| HeaderValue::from_str(origin).is_err())
        {
            return Err(ConfigError::Invalid {
                name: "FRONTEND_URL",
                value: origin.clone(),
            });
        }

        let rate_limit = RateLimitConfig {
            max_requests: parse_or(&lookup, "RATE_LIMIT_MAX", DEFAULT_RATE_LIMIT_MAX)?,
            window: std::time::Duration::from_secs(parse_or(
                &lookup,
                "RATE_LIMIT_WINDOW_SECS",
                DEFAULT_RATE_LIMIT_WINDOW_SECS,
            )?),
        };

        Ok(Self {
            environment,
            database_url,
            jwt_secret,
            cookie,
            listen_addr,
            frontend_url,
            google_client_id: lookup("GOOGLE_CLIENT_ID").filter(|id| !id.trim().is_empty()),
            http: HttpConfig {
                environment,
                static_dir: lookup("STATIC_DIR").map(PathBuf::from),
                cors_origins,
                rate_limit,
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { name, value }),
    }
}
