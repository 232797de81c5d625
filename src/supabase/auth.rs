//! GoTrue auth client: session persistence, refresh, sign-in/up/out.
//!
//! The session lives in local storage under [`SESSION_STORAGE_KEY`]. Calls
//! that change it emit on the client's [`AuthEventHub`], which backs
//! `on_auth_state_change`.

use std::sync::Arc;

use reqwest::Method;
use tracing::{debug, info, warn};

use super::SupabaseClient;
use crate::config::DEFAULT_REFRESH_MARGIN_SECS;
use crate::http;
use crate::services::events::{AuthEventHub, Subscription};
use crate::services::provider::{AccountProvider, IdentityProvider};
use crate::services::types::{AuthEvent, AuthUser, ServiceError, Session, SignUp, SignUpMetadata, now_unix};
use crate::storage::LocalStorage;

pub const SESSION_STORAGE_KEY: &str = "taskboard-auth-token";

const TOKEN_PATH: &str = "/auth/v1/token";
const SIGNUP_PATH: &str = "/auth/v1/signup";
const LOGOUT_PATH: &str = "/auth/v1/logout";
const USER_PATH: &str = "/auth/v1/user";

pub struct SupabaseAuth {
    client: SupabaseClient,
    storage: Arc<dyn LocalStorage>,
    hub: AuthEventHub,
    refresh_margin_secs: i64,
}

impl SupabaseAuth {
    #[must_use]
    pub fn new(client: SupabaseClient, storage: Arc<dyn LocalStorage>) -> Self {
        Self { client, storage, hub: AuthEventHub::new(), refresh_margin_secs: DEFAULT_REFRESH_MARGIN_SECS }
    }

    #[must_use]
    pub fn with_refresh_margin(mut self, secs: i64) -> Self {
        self.refresh_margin_secs = secs;
        self
    }

    #[must_use]
    pub fn events(&self) -> &AuthEventHub {
        &self.hub
    }

    // -------------------------------------------------------------------------
    // persistence
    // -------------------------------------------------------------------------

    fn load_persisted(&self) -> Option<Session> {
        let raw = self.storage.get_item(SESSION_STORAGE_KEY)?;
        match serde_json::from_str::<Session>(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(error = %e, "persisted session unreadable, discarding");
                self.storage.remove_item(SESSION_STORAGE_KEY);
                None
            }
        }
    }

    fn persist(&self, session: &Session) {
        match serde_json::to_string(session) {
            Ok(raw) => self.storage.set_item(SESSION_STORAGE_KEY, &raw),
            Err(e) => warn!(error = %e, "session serialize failed"),
        }
        self.client.set_access_token(Some(session.access_token.clone()));
    }

    fn clear_persisted(&self) {
        self.storage.remove_item(SESSION_STORAGE_KEY);
        self.client.set_access_token(None);
    }

    fn adopt(&self, session: Session) -> Session {
        let session = session.with_absolute_expiry(now_unix());
        self.persist(&session);
        session
    }

    // -------------------------------------------------------------------------
    // token endpoints
    // -------------------------------------------------------------------------

    async fn refresh(&self, refresh_token: &str) -> Result<Session, ServiceError> {
        let request = self
            .client
            .request(Method::POST, &grant_path("refresh_token"))
            .json(&serde_json::json!({ "refresh_token": refresh_token }));
        http::read_json(request).await
    }

    /// Sign in with email and password. Emits `SIGNED_IN`.
    ///
    /// # Errors
    ///
    /// Returns the provider's error for bad credentials or transport failure.
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, ServiceError> {
        let request = self
            .client
            .request(Method::POST, &grant_path("password"))
            .json(&serde_json::json!({ "email": email, "password": password }));
        let session: Session = http::read_json(request).await?;
        Ok(self.start_session(session))
    }

    /// Register a new provider user. A session returned by an auto-confirming
    /// provider is left inactive until [`SupabaseAuth::start_session`], so
    /// callers can finish writing the user row first.
    ///
    /// # Errors
    ///
    /// Returns the provider's error (e.g. address already registered).
    pub async fn sign_up(&self, email: &str, password: &str, metadata: &SignUpMetadata) -> Result<SignUp, ServiceError> {
        let request = self
            .client
            .request(Method::POST, SIGNUP_PATH)
            .json(&serde_json::json!({ "email": email, "password": password, "data": metadata }));
        let body = http::read_body(request).await?;
        let signup = parse_signup(&body)?;
        info!(user = %signup.user.id, confirmed = signup.session.is_some(), "signed up");
        Ok(signup)
    }

    /// Persist `session` as current and emit `SIGNED_IN`.
    pub fn start_session(&self, session: Session) -> Session {
        let session = self.adopt(session);
        info!(user = %session.user.id, "signed in");
        self.hub.emit(AuthEvent::SignedIn, Some(session.clone()));
        session
    }

    /// Revoke the current session remotely and forget it locally. Emits
    /// `SIGNED_OUT` even when the remote call fails.
    ///
    /// # Errors
    ///
    /// Returns transport or server (5xx) failures from the logout call.
    /// Rejections (the token was already invalid) count as success.
    pub async fn sign_out(&self) -> Result<(), ServiceError> {
        let remote = match self.load_persisted() {
            Some(session) => {
                let request = self.client.request_as(Method::POST, LOGOUT_PATH, &session.access_token);
                http::read_body(request).await.map(|_| ())
            }
            None => Ok(()),
        };
        self.clear_persisted();
        self.hub.emit(AuthEvent::SignedOut, None);
        info!("signed out");
        match remote {
            Err(e) if !e.is_rejection() => Err(e),
            _ => Ok(()),
        }
    }

    /// Fetch the signed-in user from the provider. `None` when signed out.
    ///
    /// # Errors
    ///
    /// Returns the provider's error if the token is rejected.
    pub async fn get_user(&self) -> Result<Option<AuthUser>, ServiceError> {
        let Some(session) = self.get_session().await? else {
            return Ok(None);
        };
        let request = self.client.request_as(Method::GET, USER_PATH, &session.access_token);
        http::read_json(request).await.map(Some)
    }
}

#[async_trait::async_trait]
impl IdentityProvider for SupabaseAuth {
    /// Load the persisted session, refreshing it when close to expiry.
    /// A rejected refresh discards the session.
    async fn get_session(&self) -> Result<Option<Session>, ServiceError> {
        let Some(session) = self.load_persisted() else {
            self.client.set_access_token(None);
            return Ok(None);
        };
        if !session.expires_within(now_unix(), self.refresh_margin_secs) {
            self.client.set_access_token(Some(session.access_token.clone()));
            return Ok(Some(session));
        }

        debug!(user = %session.user.id, "refreshing session");
        match self.refresh(&session.refresh_token).await {
            Ok(fresh) => {
                let fresh = self.adopt(fresh);
                self.hub.emit(AuthEvent::TokenRefreshed, Some(fresh.clone()));
                Ok(Some(fresh))
            }
            Err(e) if e.is_rejection() => {
                warn!(user = %session.user.id, error = %e, "session refresh rejected");
                self.clear_persisted();
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn on_auth_state_change(&self) -> Subscription {
        self.hub.subscribe()
    }
}

#[async_trait::async_trait]
impl AccountProvider for SupabaseAuth {
    async fn sign_up(&self, email: &str, password: &str, metadata: &SignUpMetadata) -> Result<SignUp, ServiceError> {
        SupabaseAuth::sign_up(self, email, password, metadata).await
    }

    fn start_session(&self, session: Session) -> Session {
        SupabaseAuth::start_session(self, session)
    }
}

fn grant_path(grant_type: &str) -> String {
    format!("{TOKEN_PATH}?grant_type={grant_type}")
}

/// Sign-up returns a full session when auto-confirm is enabled, otherwise the
/// bare user object.
fn parse_signup(body: &str) -> Result<SignUp, ServiceError> {
    let value: serde_json::Value = http::parse_json(body)?;
    if value.get("access_token").is_some() {
        let session: Session = serde_json::from_value(value).map_err(|e| ServiceError::Parse(e.to_string()))?;
        return Ok(SignUp { user: session.user.clone(), session: Some(session) });
    }
    let user: AuthUser = serde_json::from_value(value).map_err(|e| ServiceError::Parse(e.to_string()))?;
    Ok(SignUp { user, session: None })
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
