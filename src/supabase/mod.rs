//! Supabase REST clients: GoTrue auth and PostgREST user records.
//!
//! DESIGN
//! ======
//! One `SupabaseClient` is shared by the auth and datastore clients. It
//! carries the current user's access token, so datastore calls run under the
//! signed-in user's row-level-security context and fall back to the anon
//! key when nobody is signed in.

pub mod auth;
pub mod records;

use std::sync::{Arc, PoisonError, RwLock};

use reqwest::Method;

use crate::config::SupabaseConfig;
use crate::http::{self, HttpTimeouts};
use crate::services::types::ServiceError;

#[derive(Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    access_token: Arc<RwLock<Option<String>>>,
}

impl SupabaseClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &SupabaseConfig, timeouts: HttpTimeouts) -> Result<Self, ServiceError> {
        Ok(Self {
            http: http::build_client(timeouts)?,
            base_url: config.url.trim_end_matches('/').to_owned(),
            anon_key: config.anon_key.clone(),
            access_token: Arc::new(RwLock::new(None)),
        })
    }

    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        http::join_url(&self.base_url, path)
    }

    pub(crate) fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    fn bearer(&self) -> String {
        self.access_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_else(|| self.anon_key.clone())
    }

    /// Request carrying the project key and the current bearer token.
    pub(crate) fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.request_as(method, path, &self.bearer())
    }

    /// Request authenticated with an explicit bearer token.
    pub(crate) fn request_as(&self, method: Method, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.endpoint(path))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SupabaseClient {
        let config = SupabaseConfig { url: "https://abc.supabase.co/".into(), anon_key: "anon".into() };
        SupabaseClient::new(&config, HttpTimeouts::default()).unwrap()
    }

    #[test]
    fn endpoint_joins_base_and_path() {
        assert_eq!(client().endpoint("/auth/v1/user"), "https://abc.supabase.co/auth/v1/user");
    }

    #[test]
    fn bearer_defaults_to_anon_key() {
        assert_eq!(client().bearer(), "anon");
    }

    #[test]
    fn bearer_tracks_access_token_across_clones() {
        let a = client();
        let b = a.clone();
        a.set_access_token(Some("user-jwt".into()));
        assert_eq!(b.bearer(), "user-jwt");
        a.set_access_token(None);
        assert_eq!(b.bearer(), "anon");
    }

    #[test]
    fn request_sets_apikey_and_authorization() {
        let req = client().request(Method::GET, "/rest/v1/user").build().unwrap();
        assert_eq!(req.headers()["apikey"], "anon");
        assert_eq!(req.headers()["authorization"], "Bearer anon");
        assert_eq!(req.url().as_str(), "https://abc.supabase.co/rest/v1/user");
    }
}
