// ABOUTME: Result objects for login and register, plus the registration payload.
// ABOUTME: Turns resolver errors into a user-facing message without raising.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use waypoint_client::{ResolveError, server_message};

pub const LOGIN_SUCCEEDED: &str = "Login successful";
pub const LOGIN_FAILED: &str = "Login failed. Please try again.";
pub const REGISTER_SUCCEEDED: &str = "Registration successful";
pub const REGISTER_FAILED: &str = "Registration failed. Please try again.";

/// What login and register hand back to the caller. Failures are values,
/// never errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthOutcome {
    pub success: bool,
    pub message: String,
}

impl AuthOutcome {
    /// Success, using the server's message when it sent one.
    pub(crate) fn succeeded(body: &Value, fallback: &str) -> Self {
        Self {
            success: true,
            message: server_message(body).unwrap_or_else(|| fallback.to_string()),
        }
    }

    /// Failure. Only an operation error (the server understood the route and
    /// refused) contributes its message; route misses and network failures
    /// get the generic fallback.
    pub(crate) fn failed(err: &ResolveError, fallback: &str) -> Self {
        let message = match err {
            ResolveError::Operation(e) => e.server_message(),
            _ => None,
        };
        Self {
            success: false,
            message: message.unwrap_or_else(|| fallback.to_string()),
        }
    }
}

/// Sign-up payload. Extra fields are sent to the backend as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Registration {
    pub fn new(name: &str, email: &str, password: &str) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            extra: Map::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }
}
