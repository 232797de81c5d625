//! Typed configuration parsed from environment variables.

use std::path::PathBuf;

use crate::http::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS, HttpTimeouts};

pub const DEFAULT_USER_API_URL: &str = "http://127.0.0.1:5003";
pub const DEFAULT_TEAM_API_URL: &str = "http://127.0.0.1:5004";
pub const DEFAULT_DEPT_API_URL: &str = "http://127.0.0.1:5005";
pub const DEFAULT_STORAGE_PATH: &str = ".taskboard/storage.json";
pub const DEFAULT_REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required env var {var}")]
    Missing { var: String },
    #[error("config parse failed: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub supabase: SupabaseConfig,
    pub user_api_url: String,
    pub team_api_url: String,
    pub dept_api_url: String,
    pub storage_path: PathBuf,
    pub timeouts: HttpTimeouts,
    pub refresh_margin_secs: i64,
}

impl AppConfig {
    /// Build config from the process environment.
    ///
    /// Required:
    /// - `SUPABASE_URL`
    /// - `SUPABASE_ANON_KEY`
    ///
    /// Optional:
    /// - `USER_API_URL`, `TEAM_API_URL`, `DEPT_API_URL`: backend controllers
    /// - `SESSION_STORAGE_PATH`: default `.taskboard/storage.json`
    /// - `HTTP_REQUEST_TIMEOUT_SECS`: default 30
    /// - `HTTP_CONNECT_TIMEOUT_SECS`: default 10
    /// - `SESSION_REFRESH_MARGIN_SECS`: default 60
    ///
    /// # Errors
    ///
    /// Returns an error if a required var is missing or a URL is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |var: &str| {
            lookup(var)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::Missing { var: var.to_owned() })
        };
        let url_or = |var: &str, default: &str| parse_url(var, &lookup(var).unwrap_or_else(|| default.to_owned()));

        let supabase =
            SupabaseConfig { url: parse_url("SUPABASE_URL", &required("SUPABASE_URL")?)?, anon_key: required("SUPABASE_ANON_KEY")? };
        let timeouts = HttpTimeouts {
            request_secs: parse_or(&lookup, "HTTP_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: parse_or(&lookup, "HTTP_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };

        Ok(Self {
            supabase,
            user_api_url: url_or("USER_API_URL", DEFAULT_USER_API_URL)?,
            team_api_url: url_or("TEAM_API_URL", DEFAULT_TEAM_API_URL)?,
            dept_api_url: url_or("DEPT_API_URL", DEFAULT_DEPT_API_URL)?,
            storage_path: lookup("SESSION_STORAGE_PATH").map_or_else(|| PathBuf::from(DEFAULT_STORAGE_PATH), PathBuf::from),
            timeouts,
            refresh_margin_secs: parse_or(&lookup, "SESSION_REFRESH_MARGIN_SECS", DEFAULT_REFRESH_MARGIN_SECS),
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_url(var: &str, raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::Parse(format!("{var} must be an http(s) URL, got '{raw}'")));
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
