//! PostgREST access to the `user` table.

use reqwest::Method;
use uuid::Uuid;

use super::SupabaseClient;
use crate::http;
use crate::services::provider::UserRecordStore;
use crate::services::types::{Identity, ServiceError, UserRecord};

const USER_TABLE: &str = "/rest/v1/user";

pub struct PostgrestUserStore {
    client: SupabaseClient,
}

impl PostgrestUserStore {
    #[must_use]
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }
}

fn identity_query(auth_id: Uuid) -> String {
    format!("{USER_TABLE}?id=eq.{auth_id}&select=userid,role")
}

fn userid_query(userid: i32) -> String {
    format!("{USER_TABLE}?userid=eq.{userid}&select=userid&limit=1")
}

fn upsert_request(client: &SupabaseClient, record: &UserRecord) -> reqwest::RequestBuilder {
    client
        .request(Method::POST, &format!("{USER_TABLE}?on_conflict=id"))
        .header("Prefer", "resolution=merge-duplicates,return=minimal")
        .json(record)
}

/// Conflicting rows are skipped, and only rows actually written come back.
fn insert_request(client: &SupabaseClient, record: &UserRecord) -> reqwest::RequestBuilder {
    client
        .request(Method::POST, &format!("{USER_TABLE}?on_conflict=id"))
        .header("Prefer", "resolution=ignore-duplicates,return=representation")
        .json(record)
}

/// PostgREST returns an array; at most one row matches a primary key.
fn first_identity(body: &str) -> Result<Option<Identity>, ServiceError> {
    let rows: Vec<Identity> = http::parse_json(body)?;
    Ok(rows.into_iter().next())
}

#[async_trait::async_trait]
impl UserRecordStore for PostgrestUserStore {
    async fn find_identity(&self, auth_id: Uuid) -> Result<Option<Identity>, ServiceError> {
        let request = self.client.request(Method::GET, &identity_query(auth_id));
        let body = http::read_body(request).await?;
        first_identity(&body)
    }

    async fn userid_exists(&self, userid: i32) -> Result<bool, ServiceError> {
        let request = self.client.request(Method::GET, &userid_query(userid));
        let rows: Vec<serde_json::Value> = http::read_json(request).await?;
        Ok(!rows.is_empty())
    }

    async fn upsert(&self, record: &UserRecord) -> Result<(), ServiceError> {
        http::read_body(upsert_request(&self.client, record)).await.map(|_| ())
    }

    async fn insert_if_absent(&self, record: &UserRecord) -> Result<bool, ServiceError> {
        let rows: Vec<serde_json::Value> = http::read_json(insert_request(&self.client, record)).await?;
        Ok(!rows.is_empty())
    }
}
