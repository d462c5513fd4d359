// ABOUTME: Endpoint configuration resolution for the waypoint client.
// ABOUTME: Reads WAYPOINT_* environment variables, normalizes the route prefix, and never fails.

use std::ffi::OsString;
use std::time::Duration;

use serde::Serialize;

use crate::route::{OAuthProvider, with_prefix};

pub const ENV_MODE: &str = "WAYPOINT_MODE";
pub const ENV_API_URL: &str = "WAYPOINT_API_URL";
pub const ENV_CLIENT_URL: &str = "WAYPOINT_CLIENT_URL";
pub const ENV_API_PREFIX: &str = "WAYPOINT_API_PREFIX";
pub const ENV_TIMEOUT_SECS: &str = "WAYPOINT_TIMEOUT_SECS";

pub const DEFAULT_PREFIX: &str = "/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

const DEV_API_URL: &str = "http://localhost:5000";
const DEV_CLIENT_URL: &str = "http://localhost:5173";
const PROD_API_URL: &str = "https://pwd-week6-server.onrender.com";
const PROD_CLIENT_URL: &str = "https://pwd-week6-client.vercel.app";

/// Which deployment profile the client runs under. Development turns on
/// request diagnostics and selects localhost defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    Development,
    Production,
}

impl RuntimeMode {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(|m| m.trim().to_ascii_lowercase()).as_deref() {
            Some("production" | "prod") => RuntimeMode::Production,
            _ => RuntimeMode::Development,
        }
    }

    pub fn is_development(self) -> bool {
        self == RuntimeMode::Development
    }
}

/// Resolved backend location plus the settings the transport needs.
///
/// `route_prefix` is either empty or starts with `/` and never ends with `/`.
/// `base_url` never ends with `/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointConfig {
    pub base_url: String,
    pub route_prefix: String,
    pub client_url: String,
    pub mode: RuntimeMode,
    pub timeout: Duration,
}

impl EndpointConfig {
    /// Build a config directly, normalizing the prefix and base URL the same
    /// way `resolve` does. Mode defaults to production so no diagnostics fire.
    pub fn new(base_url: impl Into<String>, route_prefix: &str) -> Self {
        Self {
            base_url: trim_url(&base_url.into()),
            route_prefix: normalize_prefix(Some(route_prefix)),
            client_url: String::new(),
            mode: RuntimeMode::Production,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Resolve configuration from the process environment.
    ///
    /// Environment variables:
    /// - WAYPOINT_MODE: development | production (default: development)
    /// - WAYPOINT_API_URL: backend base URL (default depends on mode)
    /// - WAYPOINT_CLIENT_URL: front-end URL (default depends on mode)
    /// - WAYPOINT_API_PREFIX: route prefix (default: /api; "" or "/" disables it)
    /// - WAYPOINT_TIMEOUT_SECS: transport timeout in seconds (default: 10)
    pub fn resolve() -> Self {
        let config = Self::resolve_with(|key| std::env::var_os(key));
        if config.mode.is_development() {
            tracing::debug!(
                base_url = %config.base_url,
                client_url = %config.client_url,
                route_prefix = %config.route_prefix,
                timeout_secs = config.timeout.as_secs(),
                "resolved endpoint config"
            );
        }
        config
    }

    /// Resolve configuration from an arbitrary lookup. Pure: the same lookup
    /// always yields the same config.
    pub fn resolve_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<OsString>,
    {
        // A value that is not valid UTF-8 counts as absent.
        let text = |key: &str| -> Option<String> {
            lookup(key)
                .and_then(|v| v.into_string().ok())
                .filter(|v| !v.trim().is_empty())
        };

        let mode = RuntimeMode::parse(text(ENV_MODE).as_deref());
        let (default_api, default_client) = match mode {
            RuntimeMode::Development => (DEV_API_URL, DEV_CLIENT_URL),
            RuntimeMode::Production => (PROD_API_URL, PROD_CLIENT_URL),
        };

        let base_url = trim_url(&text(ENV_API_URL).unwrap_or_else(|| default_api.to_string()));
        let client_url =
            trim_url(&text(ENV_CLIENT_URL).unwrap_or_else(|| default_client.to_string()));

        // Blank is meaningful for the prefix ("no prefix"), so it bypasses `text`.
        let raw_prefix = lookup(ENV_API_PREFIX).and_then(|v| v.into_string().ok());
        let route_prefix = normalize_prefix(raw_prefix.as_deref());

        let timeout_secs = text(ENV_TIMEOUT_SECS)
            .and_then(|t| t.trim().parse::<u64>().ok())
            .filter(|t| *t > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            base_url,
            route_prefix,
            client_url,
            mode,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Absolute URL for a path that has already been prefixed as needed.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Where the browser goes to start a social login. No request is made.
    pub fn oauth_login_url(&self, provider: OAuthProvider) -> String {
        self.url_for(&with_prefix(
            &self.route_prefix,
            &format!("/auth/{}", provider.as_str()),
        ))
    }
}

/// Normalize a user-supplied route prefix.
///
/// Absent input yields `/api`. Empty or `/` yields no prefix. Anything else
/// gets exactly one leading slash and no trailing slash.
pub fn normalize_prefix(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return DEFAULT_PREFIX.to_string();
    };
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

fn trim_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}
