//! Shared HTTP client construction and response handling.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::services::types::ServiceError;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

/// Build a `reqwest` client with the configured timeouts.
///
/// # Errors
///
/// Returns [`ServiceError::HttpClientBuild`] if the TLS backend fails to initialize.
pub fn build_client(timeouts: HttpTimeouts) -> Result<reqwest::Client, ServiceError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeouts.request_secs))
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .build()
        .map_err(|e| ServiceError::HttpClientBuild(e.to_string()))
}

/// Read the status and body of a sent request.
///
/// # Errors
///
/// Returns [`ServiceError::Request`] on transport failure and
/// [`ServiceError::Response`] on a non-success status.
pub async fn read_body(request: reqwest::RequestBuilder) -> Result<String, ServiceError> {
    let response = request
        .send()
        .await
        .map_err(|e| ServiceError::Request(e.to_string()))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ServiceError::Request(e.to_string()))?;
    if !status.is_success() {
        return Err(ServiceError::Response { status: status.as_u16(), body });
    }
    Ok(body)
}

/// Send `request` and decode a JSON body.
///
/// # Errors
///
/// As [`read_body`], plus [`ServiceError::Parse`] when the body does not decode.
pub async fn read_json<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<T, ServiceError> {
    let body = read_body(request).await?;
    parse_json(&body)
}

pub(crate) fn parse_json<T: DeserializeOwned>(body: &str) -> Result<T, ServiceError> {
    serde_json::from_str(body).map_err(|e| ServiceError::Parse(e.to_string()))
}

/// Join `base` and `path` with exactly one slash between them.
#[must_use]
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
