use sqlx::types::chrono::{DateTime, Utc};
use sqlx::types::Uuid;
use sqlx::FromRow;

use types::domain::{PresenceStatus, SessionInfo, User};

#[derive(Debug, Clone, FromRow)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub hashed_password: String,
    pub is_active: bool,
}

/// A session row. The signed token itself is never persisted.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub socket_id: Option<String>,
    pub status: String,
    pub last_seen: DateTime<Utc>,
    pub device: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub location: Option<serde_json::Value>,
    pub is_active: bool,
}

impl Session {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at > now
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            user_id: self.user_id,
            expires_at: self.expires_at,
            created_at: self.created_at,
            status: if self.status == PresenceStatus::Online.as_ref() {
                PresenceStatus::Online
            } else {
                PresenceStatus::Offline
            },
            last_seen: self.last_seen,
            device: self.device.clone(),
            user_agent: self.user_agent.clone(),
            ip_address: self.ip_address.clone(),
            location: self.location.clone(),
        }
    }
}

/// A freshly created session plus the signed token handed to the client.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub user: User,
    pub session: Session,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated { user: User, session: Session },
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated { .. })
    }
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PasswordReset {
    pub token: Uuid,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}
