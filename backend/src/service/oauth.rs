use std::time::{Duration, Instant};

use eyre::{ensure, ContextCompat, Result};
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use log::debug;
use serde::Deserialize;
use tokio::sync::RwLock;

pub const GOOGLE_PROVIDER: &str = "google";
const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const GOOGLE_ISSUERS: &[&str] = &["accounts.google.com", "https://accounts.google.com"];
const JWKS_MAX_AGE: Duration = Duration::from_secs(60 * 60);

/// The parts of a Google ID token the sign-in flow cares about.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GoogleClaims {
    pub sub: String,
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    pub name: Option<String>,
}

impl GoogleClaims {
    pub fn verified_email(&self) -> Option<&str> {
        self.email.as_deref().filter(|_| self.email_verified)
    }
}

/// Checks the signature, audience, issuer and expiry of an ID token
/// against a key set.
pub fn decode_id_token(
    token: &str,
    keys: &JwkSet,
    client_id: &str,
    algorithms: &[Algorithm],
) -> Result<GoogleClaims> {
    let header = decode_header(token)?;
    ensure!(
        algorithms.contains(&header.alg),
        "Unexpected signing algorithm {:?}",
        header.alg
    );
    let kid = header.kid.wrap_err("ID token has no key id")?;
    let jwk = keys
        .find(&kid)
        .wrap_err_with(|| format!("Unknown signing key {}", kid))?;
    let key = DecodingKey::from_jwk(jwk)?;

    let mut validation = Validation::new(header.alg);
    validation.set_audience(&[client_id]);
    validation.set_issuer(GOOGLE_ISSUERS);
    Ok(decode::<GoogleClaims>(token, &key, &validation)?.claims)
}

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

/// Verifies Google ID tokens, keeping Google's signing keys cached for an hour.
#[cfg_attr(test, faux::create)]
pub struct GoogleVerifier {
    client_id: String,
    http: reqwest::Client,
    cache: RwLock<Option<CachedKeys>>,
}

#[cfg_attr(test, faux::methods)]
impl GoogleVerifier {
    pub fn new(client_id: String) -> Self {
        Self {
            client_id,
            http: reqwest::Client::new(),
            cache: RwLock::new(None),
        }
    }

    pub async fn verify(&self, id_token: String) -> Result<GoogleClaims> {
        let kid = decode_header(&id_token)?.kid.unwrap_or_default();
        let keys = signing_keys(&self.http, &self.cache, &kid).await?;
        decode_id_token(&id_token, &keys, &self.client_id, &[Algorithm::RS256])
    }
}

/// Refetches when the cache is stale or does not know `kid` (Google rotates keys).
async fn signing_keys(
    http: &reqwest::Client,
    cache: &RwLock<Option<CachedKeys>>,
    kid: &str,
) -> Result<JwkSet> {
    if let Some(cached) = cache.read().await.as_ref() {
        if cached.fetched_at.elapsed() < JWKS_MAX_AGE && cached.keys.find(kid).is_some() {
            return Ok(cached.keys.clone());
        }
    }

    debug!("Fetching Google signing keys");
    let keys: JwkSet = http
        .get(GOOGLE_JWKS_URL)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    cache.write().await.replace(CachedKeys {
        keys: keys.clone(),
        fetched_at: Instant::now(),
    });
    Ok(keys)
}
