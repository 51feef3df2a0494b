//! In-memory stand-ins for the Postgres repositories, built on `faux` mocks
//! that share one set of `DashMap` tables.

use std::sync::Arc;

use chrono::{Duration, Utc};
use dashmap::DashMap;
use sqlx::types::Uuid;

use types::domain::{PresenceStatus, User};

use crate::config::CookieConfig;
use crate::domain::auth::{AuthUser, PasswordReset, Session};
use crate::repository::auth::AuthUserRepository;
use crate::repository::oauth_accounts::OAuthAccountRepository;
use crate::repository::password_resets::PasswordResetRepository;
use crate::repository::sessions::SessionRepository;
use crate::repository::users::UserRepository;
use crate::repository::Repositories;
use crate::routes::Api;
use crate::service::auth::AuthService;
use crate::service::cookie::CookiePolicy;
use crate::service::token::TokenSigner;

pub const TEST_SECRET: &str = "test-secret-that-is-long-enough-for-hmac";
const TEST_HASH_COST: u32 = 4;

#[derive(Clone, Default)]
pub struct FakeStore {
    users: Arc<DashMap<Uuid, AuthUser>>,
    profiles: Arc<DashMap<Uuid, User>>,
    sessions: Arc<DashMap<Uuid, Session>>,
    resets: Arc<DashMap<Uuid, PasswordReset>>,
    oauth_accounts: Arc<DashMap<(String, String), Uuid>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auth_service(&self) -> AuthService {
        self.auth_service_with_cost(TEST_HASH_COST)
    }

    pub fn auth_service_with_cost(&self, hash_cost: u32) -> AuthService {
        let repositories = Repositories {
            auth: self.auth_repository(),
            users: self.user_repository(),
            sessions: self.session_repository(),
            resets: self.reset_repository(),
            oauth_accounts: self.oauth_repository(),
        };
        AuthService::new(
            repositories,
            TokenSigner::new(TEST_SECRET),
            None,
            Some("http://localhost:3000".to_string()),
            hash_cost,
        )
        .unwrap()
    }

    pub fn api(&self, cookie: CookieConfig) -> Api {
        Api {
            auth_service: self.auth_service(),
            cookies: CookiePolicy::new(cookie),
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn session(&self, id: Uuid) -> Option<Session> {
        self.sessions.get(&id).map(|session| session.value().clone())
    }

    pub fn clear_sessions(&self) {
        self.sessions.clear();
    }

    pub fn expire_session(&self, id: Uuid) {
        if let Some(mut session) = self.sessions.get_mut(&id) {
            session.expires_at = Utc::now() - Duration::minutes(1);
        }
    }

    pub fn deactivate(&self, user_id: Uuid) {
        if let Some(mut user) = self.users.get_mut(&user_id) {
            user.is_active = false;
        }
        if let Some(mut profile) = self.profiles.get_mut(&user_id) {
            profile.is_active = false;
        }
    }

    pub fn reset_token_for(&self, user_id: Uuid) -> Option<Uuid> {
        self.resets
            .iter()
            .find(|reset| reset.user_id == user_id)
            .map(|reset| reset.token)
    }

    pub fn reset_count(&self) -> usize {
        self.resets.len()
    }

    fn auth_repository(&self) -> AuthUserRepository {
        let mut repository = AuthUserRepository::faux();

        let (users, profiles) = (self.users.clone(), self.profiles.clone());
        faux::when!(repository.create_user).then(move |(email, hashed_password, name)| {
            let now = Utc::now();
            let user = AuthUser {
                id: Uuid::new_v4(),
                email: email.clone(),
                hashed_password,
                is_active: true,
            };
            profiles.insert(
                user.id,
                User {
                    id: user.id,
                    email,
                    name,
                    bio: None,
                    profile_picture: None,
                    cover_photo: None,
                    location: None,
                    website: None,
                    date_of_birth: None,
                    is_verified: false,
                    is_active: true,
                    created_at: now,
                },
            );
            users.insert(user.id, user.clone());
            Ok(user)
        });

        let users = self.users.clone();
        faux::when!(repository.get_by_email).then(move |email| {
            Ok(users
                .iter()
                .find(|user| user.email == email)
                .map(|user| user.value().clone()))
        });

        let users = self.users.clone();
        faux::when!(repository.exists)
            .then(move |email| Ok(users.iter().any(|user| user.email == email)));

        let users = self.users.clone();
        faux::when!(repository.update_password).then(move |(user_id, hashed_password)| {
            if let Some(mut user) = users.get_mut(&user_id) {
                user.hashed_password = hashed_password;
            }
            Ok(())
        });

        repository
    }

    fn user_repository(&self) -> UserRepository {
        let mut repository = UserRepository::faux();

        let profiles = self.profiles.clone();
        faux::when!(repository.get)
            .then(move |id| Ok(profiles.get(&id).map(|user| user.value().clone())));

        let (users, profiles) = (self.users.clone(), self.profiles.clone());
        faux::when!(repository.set_active).then(move |(id, is_active)| {
            if let Some(mut user) = users.get_mut(&id) {
                user.is_active = is_active;
            }
            Ok(profiles.get_mut(&id).map(|mut profile| {
                profile.is_active = is_active;
                profile.value().clone()
            }))
        });

        repository
    }

    fn session_repository(&self) -> SessionRepository {
        let mut repository = SessionRepository::faux();

        let sessions = self.sessions.clone();
        faux::when!(repository.insert).then(move |(id, user_id, expires_at, meta)| {
            let now = Utc::now();
            let session = Session {
                id,
                user_id,
                expires_at,
                created_at: now,
                updated_at: now,
                socket_id: None,
                status: "offline".to_string(),
                last_seen: now,
                device: meta.device,
                user_agent: meta.user_agent,
                ip_address: meta.ip_address,
                location: None,
                is_active: true,
            };
            sessions.insert(id, session.clone());
            Ok(session)
        });

        let sessions = self.sessions.clone();
        faux::when!(repository.get)
            .then(move |id| Ok(sessions.get(&id).map(|session| session.value().clone())));

        let sessions = self.sessions.clone();
        faux::when!(repository.list_for_user).then(move |user_id| {
            let now = Utc::now();
            Ok(sessions
                .iter()
                .filter(|session| session.user_id == user_id && session.is_live(now))
                .map(|session| session.value().clone())
                .collect())
        });

        let sessions = self.sessions.clone();
        faux::when!(repository.delete_for_user).then(move |(user_id, id)| {
            Ok(sessions
                .remove_if(&id, |_, session| session.user_id == user_id)
                .is_some())
        });

        let sessions = self.sessions.clone();
        faux::when!(repository.delete_all_for_user).then(move |user_id| {
            let before = sessions.len();
            sessions.retain(|_, session| session.user_id != user_id);
            Ok((before - sessions.len()) as u64)
        });

        let sessions = self.sessions.clone();
        faux::when!(repository.delete_expired).then(move |_| {
            let before = sessions.len();
            let now = Utc::now();
            sessions.retain(|_, session| session.expires_at > now);
            Ok((before - sessions.len()) as u64)
        });

        let sessions = self.sessions.clone();
        faux::when!(repository.mark_online).then(move |(id, socket_id)| {
            Ok(sessions.get_mut(&id).map(|mut session| {
                session.socket_id = Some(socket_id);
                session.status = PresenceStatus::Online.as_ref().to_string();
                session.last_seen = Utc::now();
                session.value().clone()
            }))
        });

        let sessions = self.sessions.clone();
        faux::when!(repository.mark_offline).then(move |(id, socket_id)| {
            Ok(sessions
                .get_mut(&id)
                .filter(|session| session.socket_id.as_deref() == Some(socket_id.as_str()))
                .map(|mut session| {
                    session.socket_id = None;
                    session.status = PresenceStatus::Offline.as_ref().to_string();
                    session.last_seen = Utc::now();
                    session.value().clone()
                }))
        });

        repository
    }

    fn reset_repository(&self) -> PasswordResetRepository {
        let mut repository = PasswordResetRepository::faux();

        let resets = self.resets.clone();
        faux::when!(repository.insert).then(move |(token, user_id, expires_at)| {
            let reset = PasswordReset {
                token,
                user_id,
                expires_at,
            };
            resets.insert(token, reset.clone());
            Ok(reset)
        });

        let resets = self.resets.clone();
        faux::when!(repository.take)
            .then(move |token| Ok(resets.remove(&token).map(|(_, reset)| reset)));

        let resets = self.resets.clone();
        faux::when!(repository.delete_expired).then(move |_| {
            let before = resets.len();
            let now = Utc::now();
            resets.retain(|_, reset| reset.expires_at > now);
            Ok((before - resets.len()) as u64)
        });

        repository
    }

    fn oauth_repository(&self) -> OAuthAccountRepository {
        let mut repository = OAuthAccountRepository::faux();

        let accounts = self.oauth_accounts.clone();
        faux::when!(repository.find_user).then(move |(provider, subject)| {
            Ok(accounts
                .get(&(provider, subject))
                .map(|user_id| *user_id.value()))
        });

        let accounts = self.oauth_accounts.clone();
        faux::when!(repository.link).then(move |(provider, subject, user_id)| {
            accounts.entry((provider, subject)).or_insert(user_id);
            Ok(())
        });

        repository
    }
}
