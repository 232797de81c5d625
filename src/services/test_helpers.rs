//! In-memory fakes for the synchronizer's collaborators.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use super::events::{AuthChange, AuthEventHub, Subscription};
use super::provider::{IdentityProvider, UserRecordStore};
use super::types::{AuthUser, Identity, ServiceError, Session, UserRecord};

/// Deterministic provider user id for a short label like `"u1"`.
#[must_use]
pub fn auth_id(label: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, label.as_bytes())
}

/// 2100-01-01T00:00:00Z.
pub const FAR_FUTURE: i64 = 4_102_444_800;

/// Session for the user labelled `label`, far from expiry.
#[must_use]
pub fn session_for(label: &str) -> Session {
    Session {
        access_token: format!("token-{label}"),
        refresh_token: format!("refresh-{label}"),
        token_type: "bearer".into(),
        expires_at: Some(FAR_FUTURE),
        expires_in: None,
        user: AuthUser {
            id: auth_id(label),
            email: Some(format!("{label}@example.com")),
            user_metadata: serde_json::json!({ "name": label, "role": "staff" }),
        },
    }
}

// =============================================================================
// FAKE PROVIDER
// =============================================================================

/// Provider returning a scripted `get_session` result.
pub struct FakeProvider {
    pub hub: AuthEventHub,
    session: Mutex<Result<Option<Session>, String>>,
    calls: Mutex<usize>,
    emit_during_get: Mutex<Option<AuthChange>>,
}

impl FakeProvider {
    #[must_use]
    pub fn with_session(session: Option<Session>) -> Self {
        Self::scripted(Ok(session))
    }

    #[must_use]
    pub fn failing(message: &str) -> Self {
        Self::scripted(Err(message.to_owned()))
    }

    fn scripted(session: Result<Option<Session>, String>) -> Self {
        Self {
            hub: AuthEventHub::new(),
            session: Mutex::new(session),
            calls: Mutex::new(0),
            emit_during_get: Mutex::new(None),
        }
    }

    /// Fire `change` from inside the next `get_session` call, before it resolves.
    pub fn emit_during_get_session(&self, change: AuthChange) {
        *self.emit_during_get.lock().unwrap() = Some(change);
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl IdentityProvider for FakeProvider {
    async fn get_session(&self) -> Result<Option<Session>, ServiceError> {
        *self.calls.lock().unwrap() += 1;
        if let Some((event, session)) = self.emit_during_get.lock().unwrap().take() {
            self.hub.emit(event, session);
        }
        self.session.lock().unwrap().clone().map_err(ServiceError::Request)
    }

    fn on_auth_state_change(&self) -> Subscription {
        self.hub.subscribe()
    }
}

// =============================================================================
// FAKE RECORD STORE
// =============================================================================

/// Record store over a map, with switchable failures.
#[derive(Default)]
pub struct FakeRecords {
    pub rows: Mutex<HashMap<Uuid, Identity>>,
    pub upserts: Mutex<Vec<UserRecord>>,
    pub inserts: Mutex<Vec<UserRecord>>,
    pub taken_userids: Mutex<Vec<i32>>,
    pub fail_lookup: Mutex<bool>,
    pub fail_upsert: Mutex<bool>,
}

impl FakeRecords {
    #[must_use]
    pub fn with_row(auth_id: Uuid, identity: Identity) -> Self {
        let records = Self::default();
        records.rows.lock().unwrap().insert(auth_id, identity);
        records
    }

    #[must_use]
    pub fn upserts(&self) -> Vec<UserRecord> {
        self.upserts.lock().unwrap().clone()
    }

    /// Rows actually created by `insert_if_absent`.
    #[must_use]
    pub fn inserts(&self) -> Vec<UserRecord> {
        self.inserts.lock().unwrap().clone()
    }

    #[must_use]
    pub fn identity_of(&self, auth_id: Uuid) -> Option<Identity> {
        self.rows.lock().unwrap().get(&auth_id).copied()
    }
}

#[async_trait::async_trait]
impl UserRecordStore for FakeRecords {
    async fn find_identity(&self, auth_id: Uuid) -> Result<Option<Identity>, ServiceError> {
        if *self.fail_lookup.lock().unwrap() {
            return Err(ServiceError::Response { status: 500, body: "lookup down".into() });
        }
        Ok(self.rows.lock().unwrap().get(&auth_id).copied())
    }

    async fn userid_exists(&self, userid: i32) -> Result<bool, ServiceError> {
        let in_rows = self.rows.lock().unwrap().values().any(|i| i.user_id == userid);
        Ok(in_rows || self.taken_userids.lock().unwrap().contains(&userid))
    }

    async fn upsert(&self, record: &UserRecord) -> Result<(), ServiceError> {
        if *self.fail_upsert.lock().unwrap() {
            return Err(ServiceError::Response { status: 403, body: "rls".into() });
        }
        self.upserts.lock().unwrap().push(record.clone());
        self.rows
            .lock()
            .unwrap()
            .insert(record.id, Identity { user_id: record.userid, role: record.role });
        Ok(())
    }

    async fn insert_if_absent(&self, record: &UserRecord) -> Result<bool, ServiceError> {
        if *self.fail_upsert.lock().unwrap() {
            return Err(ServiceError::Response { status: 403, body: "rls".into() });
        }
        let mut rows = self.rows.lock().unwrap();
        if rows.contains_key(&record.id) {
            return Ok(false);
        }
        rows.insert(record.id, Identity { user_id: record.userid, role: record.role });
        self.inserts.lock().unwrap().push(record.clone());
        Ok(true)
    }
}

// =============================================================================
// STUB HTTP SERVER
// =============================================================================

/// Request seen by a [`StubServer`].
#[derive(Debug, Clone)]
pub struct StubRequest {
    pub method: String,
    /// Path plus query string.
    pub path: String,
    pub body: String,
}

impl StubRequest {
    #[must_use]
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// Loopback HTTP/1.1 server answering from a fixed route table.
///
/// Each route is `(path prefix, status, body)`; the first prefix matching the
/// request path wins, anything else gets a 404.
pub struct StubServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<StubRequest>>>,
    handle: tokio::task::JoinHandle<()>,
}

impl StubServer {
    pub async fn start(routes: Vec<(&'static str, u16, String)>) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let routes = Arc::new(routes);

        let seen = Arc::clone(&requests);
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let seen = Arc::clone(&seen);
                let routes = Arc::clone(&routes);
                tokio::spawn(async move { serve_one(stream, &routes, &seen).await });
            }
        });
        Self { base_url, requests, handle }
    }

    #[must_use]
    pub fn requests(&self) -> Vec<StubRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_one(
    mut stream: tokio::net::TcpStream,
    routes: &[(&'static str, u16, String)],
    seen: &Mutex<Vec<StubRequest>>,
) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let mut buf = Vec::new();
    let mut chunk = [0_u8; 4096];
    let header_end = loop {
        let Ok(n) = stream.read(&mut chunk).await else { return };
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.lines();
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_owned();
    let path = request_line.next().unwrap_or_default().to_owned();
    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let Ok(n) = stream.read(&mut chunk).await else { return };
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body_end = buf.len().min(header_end + content_length);
    let body = String::from_utf8_lossy(&buf[header_end..body_end]).into_owned();

    let (status, reply) = routes
        .iter()
        .find(|(prefix, _, _)| path.starts_with(prefix))
        .map_or((404, r#"{"error":"not found"}"#.to_owned()), |(_, status, reply)| (*status, reply.clone()));
    seen.lock().unwrap().push(StubRequest { method, path, body });

    let response = format!(
        "HTTP/1.1 {status} STUB\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{reply}",
        reply.len()
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}
