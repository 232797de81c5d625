//! Collaborator seams consumed by the session synchronizer.

use uuid::Uuid;

use super::events::Subscription;
use super::types::{Identity, ServiceError, Session, SignUp, SignUpMetadata, UserRecord};

/// Issuer of sessions (Supabase GoTrue in production).
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Current session, refreshed if the provider deems it necessary.
    async fn get_session(&self) -> Result<Option<Session>, ServiceError>;

    /// Standing subscription to login, logout and token-refresh events.
    fn on_auth_state_change(&self) -> Subscription;
}

/// Account creation at the identity provider.
#[async_trait::async_trait]
pub trait AccountProvider: Send + Sync {
    /// Create the provider user. A returned session is not yet active.
    async fn sign_up(&self, email: &str, password: &str, metadata: &SignUpMetadata) -> Result<SignUp, ServiceError>;

    /// Make `session` the current one and announce `SIGNED_IN`.
    fn start_session(&self, session: Session) -> Session;
}

/// Store of application user rows keyed by provider user id.
#[async_trait::async_trait]
pub trait UserRecordStore: Send + Sync {
    /// Point lookup of `userid` + `role` for a provider user.
    async fn find_identity(&self, auth_id: Uuid) -> Result<Option<Identity>, ServiceError>;

    /// Whether any row already carries `userid`.
    async fn userid_exists(&self, userid: i32) -> Result<bool, ServiceError>;

    /// Update the row, creating it if absent.
    async fn upsert(&self, record: &UserRecord) -> Result<(), ServiceError>;

    /// Create the row unless one with the same id already exists. Returns
    /// false when an existing row was left untouched.
    async fn insert_if_absent(&self, record: &UserRecord) -> Result<bool, ServiceError>;
}
