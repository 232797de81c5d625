//! User controller: `POST /users`.

use serde::Serialize;
use uuid::Uuid;

use crate::http::{self, HttpTimeouts};
use crate::services::types::{Role, ServiceError, UserRecord};

/// Body of `POST /users`. Unlike a datastore upsert, unknown organisation
/// ids are sent as explicit nulls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateUser {
    pub id: Uuid,
    pub userid: i32,
    pub role: Role,
    pub name: Option<String>,
    pub email: Option<String>,
    pub team_id: Option<i64>,
    pub dept_id: Option<i64>,
}

impl From<&UserRecord> for CreateUser {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id,
            userid: record.userid,
            role: record.role,
            name: record.name.clone(),
            email: record.email.clone(),
            team_id: record.team_id,
            dept_id: record.dept_id,
        }
    }
}

#[derive(Clone)]
pub struct UserApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl UserApiClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeouts: HttpTimeouts) -> Result<Self, ServiceError> {
        Ok(Self { http: http::build_client(timeouts)?, base_url: base_url.trim_end_matches('/').to_owned() })
    }

    /// Create the user row. Returns the controller's JSON response.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Response`] with the controller's `error` or
    /// `message` text on a non-success status.
    pub async fn create_user(&self, record: &UserRecord) -> Result<serde_json::Value, ServiceError> {
        let request = self.http.post(http::join_url(&self.base_url, "/users")).json(&CreateUser::from(record));
        match http::read_json(request).await {
            Err(ServiceError::Response { status, body }) => {
                Err(ServiceError::Response { status, body: error_message(&body) })
            }
            other => other,
        }
    }
}

/// Pull `error` or `message` out of a controller error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["error", "message"]
                .iter()
                .find_map(|key| v.get(key).and_then(serde_json::Value::as_str).map(str::to_owned))
        })
        .unwrap_or_else(|| "failed to create user record".to_owned())
}
