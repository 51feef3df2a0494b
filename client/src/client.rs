use std::sync::Arc;

use eyre::{bail, eyre, Result};
use futures_util::FutureExt;
use log::debug;
use reqwest::Client as ReqwestClient;
use reqwest::{RequestBuilder, StatusCode};
use rust_socketio::asynchronous::Client as SocketClient;
use rust_socketio::asynchronous::ClientBuilder;
use rust_socketio::Payload;
use serde_json::json;
use tokio::sync::RwLock;
use uuid::Uuid;

use types::domain::*;

// const BASE_URL: &str = "https://api.example.com";
const BASE_URL: &str = "http://localhost:8080";

async fn bind_session(payload: Payload, bound: Arc<RwLock<Option<SessionInfo>>>) {
    if let Payload::Text(values) = payload {
        let session = values
            .into_iter()
            .find_map(|value| match serde_json::from_value::<SessionInfo>(value) {
                Ok(session) => Some(session),
                Err(e) => {
                    debug!("Error deserializing: {:?}", e);
                    None
                }
            });
        if let Some(session) = session {
            bound.write().await.replace(session);
        }
    }
}

#[allow(deprecated)]
async fn default_callback(payload: Payload) {
    match payload {
        Payload::Text(values) => debug!("Received text: {:#?}", values),
        Payload::Binary(bin_data) => debug!("Received bytes: {:#?}", bin_data),
        Payload::String(str) => debug!("Received str: {}", str),
    }
}

/// HTTP client that keeps the session cookie in its own jar, the way a
/// browser would, and can hold one presence socket.
pub struct Client {
    pub client: ReqwestClient,
    pub ws_client: Option<SocketClient>,
    pub token: Option<String>,
    pub user: Option<User>,
    pub bound_session: Arc<RwLock<Option<SessionInfo>>>,
    base_url: String,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: ReqwestClient::builder()
                .cookie_store(true)
                .redirect(reqwest::redirect::Policy::none())
                .build()
                .unwrap_or_default(),
            ws_client: None,
            token: None,
            user: None,
            bound_session: Arc::new(RwLock::new(None)),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends the token as a bearer header too, for servers the jar does not reach.
    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub async fn sign_up(&mut self, request: SignupRequest) -> Result<AuthResponse> {
        let response = self
            .client
            .post(self.url("/api/auth/sign-up"))
            .json(&request)
            .send()
            .await?;
        let auth: AuthResponse = match response.status() {
            StatusCode::CREATED => response.json().await?,
            _ => bail!(response.text().await?),
        };
        self.remember(&auth);
        Ok(auth)
    }

    pub async fn sign_in(&mut self, request: LoginRequest) -> Result<AuthResponse> {
        let response = self
            .client
            .post(self.url("/api/auth/sign-in"))
            .json(&request)
            .send()
            .await?;
        let auth: AuthResponse = match response.status() {
            StatusCode::OK => response.json().await?,
            _ => bail!(response.text().await?),
        };
        self.remember(&auth);
        Ok(auth)
    }

    pub async fn sign_in_with_google(&mut self, id_token: String) -> Result<AuthResponse> {
        let response = self
            .client
            .post(self.url("/api/auth/sign-in/google"))
            .json(&GoogleSignInRequest { id_token })
            .send()
            .await?;
        let auth: AuthResponse = match response.status() {
            StatusCode::OK => response.json().await?,
            _ => bail!(response.text().await?),
        };
        self.remember(&auth);
        Ok(auth)
    }

    fn remember(&mut self, auth: &AuthResponse) {
        self.token = Some(auth.token.clone());
        self.user = Some(auth.user.clone());
    }

    pub async fn sign_out(&mut self) -> Result<()> {
        let response = self
            .authorized(self.client.post(self.url("/api/auth/sign-out")))
            .send()
            .await?;
        self.token = None;
        self.user = None;
        match response.status() {
            StatusCode::OK => Ok(()),
            _ => bail!(response.text().await?),
        }
    }

    /// `None` when the server does not recognise the caller.
    pub async fn me(&self) -> Result<Option<MeResponse>> {
        let response = self
            .authorized(self.client.get(self.url("/api/me")))
            .send()
            .await?;
        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            _ => bail!(response.text().await?),
        }
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionInfo>> {
        let response = self
            .authorized(self.client.get(self.url("/api/auth/list-sessions")))
            .send()
            .await?;
        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            _ => bail!(response.text().await?),
        }
    }

    pub async fn revoke_session(&self, session_id: Uuid) -> Result<()> {
        let response = self
            .authorized(self.client.post(self.url("/api/auth/revoke-session")))
            .json(&RevokeSessionRequest { session_id })
            .send()
            .await?;
        match response.status() {
            StatusCode::OK => Ok(()),
            _ => bail!(response.text().await?),
        }
    }

    pub async fn forgot_password(&self, email: String) -> Result<()> {
        let response = self
            .client
            .post(self.url("/api/auth/forgot-password"))
            .json(&ForgotPasswordRequest { email })
            .send()
            .await?;
        match response.status() {
            StatusCode::OK => Ok(()),
            _ => bail!(response.text().await?),
        }
    }

    pub async fn reset_password(&self, request: ResetPasswordRequest) -> Result<()> {
        let response = self
            .client
            .post(self.url("/api/auth/reset-password"))
            .json(&request)
            .send()
            .await?;
        match response.status() {
            StatusCode::OK => Ok(()),
            _ => bail!(response.text().await?),
        }
    }

    /// Fetches a page without following redirects and returns the status
    /// together with the `Location` header, if any.
    pub async fn visit(&self, path: &str) -> Result<(StatusCode, Option<String>)> {
        let response = self.client.get(self.url(path)).send().await?;
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        Ok((response.status(), location))
    }

    /// Opens the presence socket. The server answers with `session_bound`
    /// and marks the session online.
    pub async fn connect_presence(&mut self) -> Result<()> {
        let token = self.token.clone().ok_or_else(|| eyre!("No token"))?;
        let bound = self.bound_session.clone();
        let bound_callback = move |payload, _| bind_session(payload, bound.clone()).boxed();
        let error_callback = |payload, _| default_callback(payload).boxed();
        let fallback_callback = |payload, _| default_callback(payload).boxed();

        let socket = ClientBuilder::new(self.base_url.as_str())
            .namespace("/")
            .auth(json!(SocketAuth { token }))
            .on(ServiceEvent::SessionBound.as_ref(), bound_callback)
            .on(ServiceEvent::ServiceError.as_ref(), error_callback)
            .on("error", fallback_callback)
            .connect()
            .await?;
        self.ws_client = Some(socket);
        Ok(())
    }

    pub async fn disconnect_presence(&mut self) -> Result<()> {
        if let Some(socket) = self.ws_client.take() {
            socket.disconnect().await?;
        }
        Ok(())
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Some(ws_client) = self.ws_client.take() {
            tokio::spawn(async move {
                if let Err(e) = ws_client.disconnect().await {
                    debug!("Failed to disconnect in drop: {:?}", e);
                }
            });
        }
    }
}
