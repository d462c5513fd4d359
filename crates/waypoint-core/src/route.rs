// ABOUTME: Candidate requests and the catalog of logical endpoints with their guessed path shapes.
// ABOUTME: Renders path templates and expands each candidate into prefixed and bare forms.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// HTTP methods the resolver issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while turning a candidate request into concrete paths.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("candidate request has no path candidates")]
    NoCandidates,

    #[error("path template '{template}' needs parameter '{name}'")]
    MissingParam { template: String, name: String },

    #[error("path template '{0}' has an unterminated placeholder")]
    Unterminated(String),

    #[error("unknown social login provider: {0}")]
    UnknownProvider(String),
}

/// Social login providers the backend redirects through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Naver,
}

impl OAuthProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Naver => "naver",
        }
    }
}

impl FromStr for OAuthProvider {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(OAuthProvider::Google),
            "naver" => Ok(OAuthProvider::Naver),
            other => Err(RouteError::UnknownProvider(other.to_string())),
        }
    }
}

/// Logical operations exposed by the auth backend. Each one knows its method
/// and the ordered path shapes it may live at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Register,
    Login,
    Logout,
    WhoAmI,
    ListUsers,
    ChangeUserType,
}

impl Endpoint {
    pub fn method(self) -> Method {
        match self {
            Endpoint::Register | Endpoint::Login | Endpoint::Logout => Method::Post,
            Endpoint::WhoAmI | Endpoint::ListUsers => Method::Get,
            Endpoint::ChangeUserType => Method::Put,
        }
    }

    pub fn candidates(self) -> &'static [&'static str] {
        match self {
            Endpoint::Register => &["/auth/register", "/users/register", "/register"],
            Endpoint::Login => &["/auth/login", "/users/login", "/login"],
            Endpoint::Logout => &["/auth/logout", "/users/logout", "/logout"],
            Endpoint::WhoAmI => &["/auth/me", "/users/me", "/me", "/auth/current-user"],
            Endpoint::ListUsers => &["/users/all", "/users"],
            Endpoint::ChangeUserType => &["/users/{id}/type", "/users/{id}"],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Endpoint::Register => "register",
            Endpoint::Login => "login",
            Endpoint::Logout => "logout",
            Endpoint::WhoAmI => "who_am_i",
            Endpoint::ListUsers => "list_users",
            Endpoint::ChangeUserType => "change_user_type",
        }
    }
}

/// One logical call: a method plus the ordered path templates to try.
///
/// Order of `path_candidates` is the trial order. Templates may contain
/// `{name}` placeholders filled from `params`.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRequest {
    pub method: Method,
    pub path_candidates: Vec<String>,
    pub payload: Option<Value>,
    pub query: Vec<(String, String)>,
    pub params: Vec<(String, String)>,
}

impl CandidateRequest {
    pub fn new<I, S>(method: Method, path_candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method,
            path_candidates: path_candidates.into_iter().map(Into::into).collect(),
            payload: None,
            query: Vec::new(),
            params: Vec::new(),
        }
    }

    /// Start a request from the endpoint catalog.
    pub fn for_endpoint(endpoint: Endpoint) -> Self {
        Self::new(endpoint.method(), endpoint.candidates().iter().copied())
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Fill every template's placeholders, keeping candidate order.
    pub fn rendered_paths(&self) -> Result<Vec<String>, RouteError> {
        if self.path_candidates.is_empty() {
            return Err(RouteError::NoCandidates);
        }
        self.path_candidates
            .iter()
            .map(|template| render_template(template, &self.params))
            .collect()
    }

    /// Concrete paths in trial order: for each template the prefixed form
    /// first, then the bare form. A path already tried is never repeated.
    pub fn attempt_paths(&self, route_prefix: &str) -> Result<Vec<String>, RouteError> {
        let mut attempts: Vec<String> = Vec::new();
        for path in self.rendered_paths()? {
            for candidate in [with_prefix(route_prefix, &path), path] {
                if !attempts.contains(&candidate) {
                    attempts.push(candidate);
                }
            }
        }
        Ok(attempts)
    }
}

/// Join a normalized prefix and a path. A path that already carries the
/// prefix is returned unchanged.
pub fn with_prefix(route_prefix: &str, path: &str) -> String {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    if route_prefix.is_empty()
        || path == route_prefix
        || path.starts_with(&format!("{route_prefix}/"))
    {
        return path;
    }
    format!("{route_prefix}{path}")
}

fn render_template(template: &str, params: &[(String, String)]) -> Result<String, RouteError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| RouteError::Unterminated(template.to_string()))?;
        let name = &after[..close];
        let value = params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .ok_or_else(|| RouteError::MissingParam {
                template: template.to_string(),
                name: name.to_string(),
            })?;
        // Each value fills exactly one path segment.
        out.push_str(&urlencoding::encode(value));
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    if !out.starts_with('/') {
        out.insert(0, '/');
    }
    Ok(out)
}
