//! Team and department directory lookups.
//!
//! Both calls degrade to an empty list on failure; registration then simply
//! leaves the organisation ids unset.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::http::{self, HttpTimeouts};
use crate::services::types::ServiceError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub dept_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Department {
    pub id: i64,
    pub name: String,
}

#[derive(Deserialize)]
struct Listing<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Clone)]
pub struct DirectoryClient {
    http: reqwest::Client,
    team_api_url: String,
    dept_api_url: String,
}

impl DirectoryClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(team_api_url: &str, dept_api_url: &str, timeouts: HttpTimeouts) -> Result<Self, ServiceError> {
        Ok(Self {
            http: http::build_client(timeouts)?,
            team_api_url: team_api_url.to_owned(),
            dept_api_url: dept_api_url.to_owned(),
        })
    }

    pub async fn list_teams(&self) -> Vec<Team> {
        self.list(&self.team_api_url, "/teams").await
    }

    pub async fn list_departments(&self) -> Vec<Department> {
        self.list(&self.dept_api_url, "/departments").await
    }

    async fn list<T: DeserializeOwned>(&self, base: &str, path: &str) -> Vec<T> {
        let request = self.http.get(http::join_url(base, path));
        match http::read_body(request).await.and_then(|body| parse_listing(&body)) {
            Ok(items) => items,
            Err(e) => {
                warn!(path, error = %e, "directory lookup failed");
                Vec::new()
            }
        }
    }
}

fn parse_listing<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, ServiceError> {
    http::parse_json::<Listing<T>>(body).map(|listing| listing.data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_listing_reads_data_array() {
        let teams: Vec<Team> =
            parse_listing(r#"{"data": [{"id": 1, "name": "Ops", "dept_id": 4}, {"id": 2, "name": "QA"}]}"#).unwrap();
        assert_eq!(teams[0], Team { id: 1, name: "Ops".into(), dept_id: Some(4) });
        assert_eq!(teams[1].dept_id, None);
    }

    #[test]
    fn parse_listing_missing_data_is_empty() {
        let depts: Vec<Department> = parse_listing("{}").unwrap();
        assert!(depts.is_empty());
    }

    #[tokio::test]
    async fn unreachable_directory_yields_empty_lists() {
        let timeouts = HttpTimeouts { request_secs: 2, connect_secs: 1 };
        let client = DirectoryClient::new("http://127.0.0.1:1", "http://127.0.0.1:1", timeouts).unwrap();
        assert!(client.list_teams().await.is_empty());
        assert!(client.list_departments().await.is_empty());
    }
}
