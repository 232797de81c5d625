//! Account registration: provider sign-up plus the application user row.
//!
//! ARCHITECTURE
//! ============
//! 1. Sign up with the identity provider, recording `role` and `name` as
//!    user metadata.
//! 2. Resolve the organisation: a team name yields the team id and that
//!    team's department; otherwise a department name yields the department.
//! 3. Draw a free `userid` from the record store.
//! 4. Create the row through the backend user controller, which can write
//!    before the new user holds a session.
//! 5. Only then start any session the provider returned, so the
//!    synchronizer's reconcile finds the row instead of racing to create it.

use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info};

use super::provider::{AccountProvider, UserRecordStore};
use super::types::{Identity, Role, ServiceError, Session, SignUpMetadata, UserRecord};
use crate::backend::{Department, DirectoryClient, Team, UserApiClient};

pub const USERID_MIN: i32 = 100;
pub const USERID_MAX: i32 = 999;
pub const MAX_USERID_ATTEMPTS: usize = 64;

/// Provider minimum password length.
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("invalid registration: {0}")]
    Invalid(String),
    #[error("sign-up failed: {0}")]
    SignUp(#[source] ServiceError),
    #[error("userid allocation failed: {0}")]
    UserId(#[source] ServiceError),
    #[error("user record creation failed: {0}")]
    CreateUser(#[source] ServiceError),
}

/// Draw random ids in `USERID_MIN..=USERID_MAX` until one is unused.
///
/// # Errors
///
/// Propagates record-store failures, and returns
/// [`ServiceError::UserIdsExhausted`] after [`MAX_USERID_ATTEMPTS`] collisions.
pub async fn generate_userid(records: &dyn UserRecordStore) -> Result<i32, ServiceError> {
    for attempt in 1..=MAX_USERID_ATTEMPTS {
        let candidate = rand::rng().random_range(USERID_MIN..=USERID_MAX);
        if !records.userid_exists(candidate).await? {
            debug!(userid = candidate, attempt, "allocated userid");
            return Ok(candidate);
        }
    }
    Err(ServiceError::UserIdsExhausted { attempts: MAX_USERID_ATTEMPTS })
}

/// Map organisation names to `(team_id, dept_id)`. A team name takes
/// precedence and carries its own department.
#[must_use]
pub fn map_org(
    teams: &[Team],
    departments: &[Department],
    team_name: Option<&str>,
    department_name: Option<&str>,
) -> (Option<i64>, Option<i64>) {
    if let Some(name) = team_name {
        return teams
            .iter()
            .find(|t| t.name == name)
            .map_or((None, None), |t| (Some(t.id), t.dept_id));
    }
    let dept_id = department_name.and_then(|name| departments.iter().find(|d| d.name == name).map(|d| d.id));
    (None, dept_id)
}

/// Registration form.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub role: Role,
    pub name: String,
    pub team: Option<String>,
    pub department: Option<String>,
}

impl Registration {
    /// # Errors
    ///
    /// Returns [`RegistrationError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), RegistrationError> {
        if !self.email.contains('@') {
            return Err(RegistrationError::Invalid("email address is malformed".into()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(RegistrationError::Invalid(format!("password needs at least {MIN_PASSWORD_LEN} characters")));
        }
        if self.name.trim().is_empty() {
            return Err(RegistrationError::Invalid("name is required".into()));
        }
        Ok(())
    }

    fn team(&self) -> Option<&str> {
        self.team.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    fn department(&self) -> Option<&str> {
        self.department.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct Registered {
    pub record: UserRecord,
    /// Present when the provider signs the user in immediately.
    pub session: Option<Session>,
}

pub struct Registrar {
    accounts: Arc<dyn AccountProvider>,
    records: Arc<dyn UserRecordStore>,
    users: UserApiClient,
    directory: DirectoryClient,
}

impl Registrar {
    #[must_use]
    pub fn new(
        accounts: Arc<dyn AccountProvider>,
        records: Arc<dyn UserRecordStore>,
        users: UserApiClient,
        directory: DirectoryClient,
    ) -> Self {
        Self { accounts, records, users, directory }
    }

    /// Register `form` end to end.
    ///
    /// # Errors
    ///
    /// Returns the first failing step. A provider account created before a
    /// later failure is left in place, and its session is never started.
    pub async fn register(&self, form: &Registration) -> Result<Registered, RegistrationError> {
        form.validate()?;

        let metadata = SignUpMetadata { role: form.role, name: form.name.trim().to_owned() };
        let signup = self
            .accounts
            .sign_up(&form.email, &form.password, &metadata)
            .await
            .map_err(RegistrationError::SignUp)?;

        let (team_id, dept_id) = self.resolve_org(form).await;
        let userid = generate_userid(self.records.as_ref()).await.map_err(RegistrationError::UserId)?;

        let mut record = UserRecord::for_auth_user(&signup.user, Identity { user_id: userid, role: form.role });
        record.name = Some(metadata.name);
        record.email = Some(form.email.clone());
        record.team_id = team_id;
        record.dept_id = dept_id;

        self.users.create_user(&record).await.map_err(RegistrationError::CreateUser)?;
        info!(user = %record.id, userid, role = %record.role, ?team_id, ?dept_id, "registered user");
        let session = signup.session.map(|session| self.accounts.start_session(session));
        Ok(Registered { record, session })
    }

    async fn resolve_org(&self, form: &Registration) -> (Option<i64>, Option<i64>) {
        match (form.team(), form.department()) {
            (Some(team), _) => map_org(&self.directory.list_teams().await, &[], Some(team), None),
            (None, Some(dept)) => map_org(&[], &self.directory.list_departments().await, None, Some(dept)),
            (None, None) => (None, None),
        }
    }
}

#[cfg(test)]
#[path = "registration_test.rs"]
mod tests;
