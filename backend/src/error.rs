use thiserror::Error;

/// Raised while resolving configuration at startup. Any of these stops the server.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
    #[error("SameSite=None cookies must also be Secure")]
    InsecureCrossSiteCookie,
    #[error("cross-subdomain cookies need COOKIE_DOMAIN")]
    MissingCookieDomain,
}
