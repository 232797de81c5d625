//! Session types: provider sessions, derived identity, auth events, errors.
//!
//! Shared by the synchronizer, the Supabase clients and the navigation guard.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by remote service calls (identity provider, datastore,
/// backend controllers).
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The HTTP request could not be sent or its body could not be read.
    #[error("request failed: {0}")]
    Request(String),

    /// The service returned a non-success HTTP status.
    #[error("response error: status {status}")]
    Response { status: u16, body: String },

    /// The response body could not be deserialized.
    #[error("response parse failed: {0}")]
    Parse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// Every candidate `userid` drawn was already taken.
    #[error("no free userid after {attempts} attempts")]
    UserIdsExhausted { attempts: usize },
}

impl ServiceError {
    /// True for 4xx responses: the service understood and rejected the call.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Response { status: 400..=499, .. })
    }
}

// =============================================================================
// ROLE / IDENTITY
// =============================================================================

/// Application role stored on the user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Role {
    Staff,
    Manager,
    Director,
    Hr,
    Admin,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Staff => "staff",
            Self::Manager => "manager",
            Self::Director => "director",
            Self::Hr => "hr",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "staff" => Ok(Self::Staff),
            "manager" => Ok(Self::Manager),
            "director" => Ok(Self::Director),
            "hr" => Ok(Self::Hr),
            "admin" => Ok(Self::Admin),
            _ => Err(UnknownRole(raw.to_owned())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

/// Application-level identity derived from a session plus a user-record lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Small integer id assigned at registration (column `userid`).
    #[serde(rename = "userid")]
    pub user_id: i32,
    pub role: Role,
}

// =============================================================================
// SESSION
// =============================================================================

/// Seconds since the unix epoch, UTC.
#[must_use]
pub fn now_unix() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

/// User object issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    /// Free-form metadata captured at sign-up (`role`, `name`).
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl AuthUser {
    /// Read a string field from `user_metadata`.
    #[must_use]
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.user_metadata.get(key).and_then(serde_json::Value::as_str)
    }
}

/// Credential bundle issued by the identity provider.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Absolute expiry, unix seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
    /// Relative lifetime in seconds, as returned by token endpoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    pub user: AuthUser,
}

fn default_token_type() -> String {
    "bearer".to_owned()
}

impl Session {
    /// Fill `expires_at` from `expires_in` when the provider only sent the latter.
    #[must_use]
    pub fn with_absolute_expiry(mut self, now: i64) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = self.expires_in.map(|secs| now + secs);
        }
        self
    }

    /// True when the session is expired or expires within `margin_secs`.
    /// Sessions without a known expiry never need a refresh.
    #[must_use]
    pub fn expires_within(&self, now: i64, margin_secs: i64) -> bool {
        self.expires_at.is_some_and(|at| at - margin_secs <= now)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// Metadata recorded on the provider user at sign-up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignUpMetadata {
    pub role: Role,
    pub name: String,
}

/// Result of a sign-up: the new user, and a session when the provider
/// auto-confirms.
#[derive(Debug, Clone)]
pub struct SignUp {
    pub user: AuthUser,
    pub session: Option<Session>,
}

// =============================================================================
// AUTH EVENTS
// =============================================================================

/// Change notifications delivered by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

impl AuthEvent {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InitialSession => "INITIAL_SESSION",
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::UserUpdated => "USER_UPDATED",
        }
    }
}

impl fmt::Display for AuthEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// USER RECORD
// =============================================================================

/// Row in the `user` table, keyed by the provider user id.
///
/// Optional columns are omitted when unknown so an upsert never blanks
/// values written elsewhere (e.g. team assignment).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub userid: i32,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dept_id: Option<i64>,
}

impl UserRecord {
    /// Build the record for `user` carrying `identity`, naming it from
    /// sign-up metadata.
    #[must_use]
    pub fn for_auth_user(user: &AuthUser, identity: Identity) -> Self {
        Self {
            id: user.id,
            userid: identity.user_id,
            role: identity.role,
            name: user.metadata_str("name").map(str::to_owned),
            email: user.email.clone(),
            team_id: None,
            dept_id: None,
        }
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
