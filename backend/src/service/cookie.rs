use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use axum_extra::extract::cookie::Cookie;
use eyre::Result;

use crate::config::CookieConfig;

/// Builds the Set-Cookie headers for the session cookie.
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    config: CookieConfig,
}

impl CookiePolicy {
    pub fn new(config: CookieConfig) -> Self {
        Self { config }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        let mut builder = Cookie::build((self.config.name.clone(), token))
            .path(self.config.path.clone())
            .http_only(self.config.http_only)
            .secure(self.config.secure)
            .same_site(self.config.same_site)
            .max_age(self.config.max_age);
        if let Some(domain) = &self.config.domain {
            builder = builder.domain(domain.clone());
        }
        builder.build()
    }

    /// One expired cookie per attribute set the session cookie may have been
    /// written with. A removal only matches if name, path and domain all match.
    pub fn removal_cookies(&self) -> Vec<Cookie<'static>> {
        let mut domains = vec![None];
        if let Some(domain) = &self.config.domain {
            domains.insert(0, Some(domain.clone()));
        }
        domains
            .into_iter()
            .map(|domain| {
                let mut builder = Cookie::build((self.config.name.clone(), ""))
                    .path(self.config.path.clone())
                    .http_only(self.config.http_only)
                    .secure(self.config.secure)
                    .same_site(self.config.same_site);
                if let Some(domain) = domain {
                    builder = builder.domain(domain);
                }
                let mut cookie = builder.build();
                cookie.make_removal();
                cookie
            })
            .collect()
    }

    pub fn set_session_headers(&self, token: String) -> Result<HeaderMap> {
        to_headers(vec![self.session_cookie(token)])
    }

    pub fn clear_session_headers(&self) -> Result<HeaderMap> {
        to_headers(self.removal_cookies())
    }
}

fn to_headers(cookies: Vec<Cookie<'static>>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for cookie in cookies {
        headers.append(SET_COOKIE, HeaderValue::from_str(&cookie.to_string())?);
    }
    Ok(headers)
}
