use chrono::{Duration, Utc};
use eyre::Result;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;

/// Lifetime of both the session row and the token bound to it.
pub const SESSION_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 signer binding a session id to its owner.
#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue(&self, session_id: Uuid, user_id: Uuid) -> Result<String> {
        let now = Utc::now();
        let claims = SessionClaims {
            session_id,
            user_id,
            iat: now.timestamp(),
            exp: (now + Duration::days(SESSION_TTL_DAYS)).timestamp(),
        };
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &SessionClaims) -> Result<String> {
        encode(&Header::default(), claims, &self.encoding_key).map_err(Into::into)
    }

    /// Checks signature and expiry. Says nothing about whether the session still exists.
    pub fn verify(&self, token: &str) -> Result<SessionClaims> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &Validation::default())?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new("test-secret-that-is-long-enough-for-hmac")
    }

    #[test]
    fn test_issue_and_verify() {
        let signer = signer();
        let session_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();

        let token = signer.issue(session_id, user_id).unwrap();
        let claims = signer.verify(&token).unwrap();

        assert_eq!(claims.session_id, session_id);
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.exp - claims.iat, SESSION_TTL_DAYS * 24 * 60 * 60);
    }

    #[test]
    fn test_token_does_not_expose_raw_ids() {
        let signer = signer();
        let session_id = Uuid::new_v4();
        let token = signer.issue(session_id, Uuid::new_v4()).unwrap();
        assert!(!token.contains(&session_id.to_string()));
    }

    #[test]
    fn test_different_secret_fails() {
        let token = signer().issue(Uuid::new_v4(), Uuid::new_v4()).unwrap();
        let other = TokenSigner::new("another-secret");
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn test_tampered_token_fails() {
        let signer = signer();
        let token = signer.issue(Uuid::new_v4(), Uuid::new_v4()).unwrap();
        let mut parts: Vec<String> = token.split('.').map(String::from).collect();
        parts[1] = parts[1].chars().rev().collect();
        assert!(signer.verify(&parts.join(".")).is_err());
    }

    #[test]
    fn test_expired_token_fails() {
        let signer = signer();
        // well past the default 60 second leeway
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            session_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            iat: now - 600,
            exp: now - 300,
        };
        let token = signer.sign(&claims).unwrap();
        assert!(signer.verify(&token).is_err());
    }
}
